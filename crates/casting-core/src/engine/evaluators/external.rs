use super::{Evaluation, Evaluator, EvaluatorError, parse_params};
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{XyzFile, XyzFrame};
use crate::core::models::structure::StructureData;
use crate::engine::config::ConfigError;
use serde::Deserialize;
use std::io::{Cursor, ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ExternalCommandParams {
    program: PathBuf,
    #[serde(default)]
    args: Vec<String>,
}

/// Delegates scoring to a user-supplied program.
///
/// The structure is written to the program's stdin as one extended-XYZ frame. The program must
/// print the energy per atom on the first line of stdout and may follow it with a relaxed frame
/// holding the same species in the same order. Any non-zero exit status or unreadable output is
/// a hard failure.
#[derive(Debug, Clone)]
pub struct ExternalCommandEvaluator {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalCommandEvaluator {
    pub const NAME: &'static str = "external-command";

    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_params(params: &toml::Table) -> Result<Self, ConfigError> {
        let p: ExternalCommandParams = parse_params(Self::NAME, params)?;
        if p.program.as_os_str().is_empty() {
            return Err(ConfigError::EvaluatorParams {
                evaluator: Self::NAME.to_string(),
                reason: "'program' must not be empty".to_string(),
            });
        }
        Ok(Self::new(p.program, p.args))
    }

    fn unavailable(&self, reason: impl Into<String>) -> EvaluatorError {
        EvaluatorError::Unavailable {
            evaluator: Self::NAME.to_string(),
            reason: reason.into(),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> EvaluatorError {
        EvaluatorError::Failed {
            evaluator: Self::NAME.to_string(),
            reason: reason.into(),
        }
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        if self.program.components().count() > 1 {
            return self.program.is_file().then(|| self.program.clone());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.program))
            .find(|candidate| candidate.is_file())
    }

    fn parse_output(
        &self,
        stdout: &str,
        structure: &StructureData,
    ) -> Result<Evaluation, EvaluatorError> {
        let mut lines = stdout.lines().skip_while(|l| l.trim().is_empty());
        let first = lines
            .next()
            .ok_or_else(|| self.failed("program produced no output"))?;
        let energy: f64 = first
            .trim()
            .parse()
            .map_err(|_| self.failed(format!("first output line is not an energy: '{first}'")))?;

        let rest: Vec<&str> = lines.collect();
        if rest.iter().all(|l| l.trim().is_empty()) {
            return Ok(Evaluation::new(structure.clone(), energy));
        }

        let mut reader = Cursor::new(rest.join("\n"));
        let frame = XyzFile::read_frame(&mut reader)
            .map_err(|e| self.failed(format!("invalid relaxed structure: {e}")))?
            .ok_or_else(|| self.failed("relaxed structure is empty"))?;
        let relaxed = frame
            .into_structure_like(structure)
            .map_err(|e| self.failed(format!("invalid relaxed structure: {e}")))?;
        Ok(Evaluation::new(relaxed, energy))
    }
}

impl Evaluator for ExternalCommandEvaluator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check_available(&self) -> Result<(), EvaluatorError> {
        match self.resolve_program() {
            Some(path) => {
                debug!(program = %path.display(), "External evaluator program found.");
                Ok(())
            }
            None => Err(self.unavailable(format!(
                "program '{}' was not found",
                self.program.display()
            ))),
        }
    }

    #[instrument(level = "trace", skip_all, fields(program = %self.program.display()))]
    fn evaluate(&self, structure: &StructureData) -> Result<Evaluation, EvaluatorError> {
        let mut input = Vec::new();
        XyzFile::write_frame(&XyzFrame::from_structure(structure, None), &mut input)
            .map_err(|e| self.failed(format!("could not serialize structure: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => self.unavailable(e.to_string()),
                _ => EvaluatorError::Io(e),
            })?;

        // Feed stdin from its own thread so a program that streams output as it reads cannot
        // fill the stdout pipe while we are still writing.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| -> Result<_, EvaluatorError> {
            let writer = scope.spawn(|| match stdin {
                Some(mut stdin) => match stdin.write_all(&input) {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                },
                None => Ok(()),
            });
            let output = child.wait_with_output()?;
            writer
                .join()
                .map_err(|_| self.failed("stdin writer thread panicked"))??;
            Ok(output)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!(
                "program exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_output(&stdout, structure)
    }
}
