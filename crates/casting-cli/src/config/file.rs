use crate::error::{CliError, Result};
use casting::core::constraints::Constraint;
use casting::core::models::lattice::ParameterRange;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub seed: Option<u64>,
    pub lattice: Option<FileLatticeConfig>,
    pub constraint: Option<FileConstraintConfig>,
    pub optimizer: Option<FileOptimizerConfig>,
    pub evaluator: Option<FileEvaluatorConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub pad: f64,
}

impl From<FileRange> for ParameterRange {
    fn from(r: FileRange) -> Self {
        ParameterRange::new(r.min, r.max).with_pad(r.pad)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileLatticeConfig {
    pub a: FileRange,
    pub b: FileRange,
    pub c: FileRange,
    pub alpha: Option<FileRange>,
    pub beta: Option<FileRange>,
    pub gamma: Option<FileRange>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConstraintConfig {
    pub min_num_atoms: usize,
    pub max_num_atoms: usize,
    pub composition: BTreeMap<String, u32>,
    pub min_atom_pair_distance: f64,
    pub max_atom_pair_distance: f64,
}

impl From<FileConstraintConfig> for Constraint {
    fn from(p: FileConstraintConfig) -> Self {
        Self {
            min_num_atoms: p.min_num_atoms,
            max_num_atoms: p.max_num_atoms,
            composition: p.composition,
            min_atom_pair_distance: p.min_atom_pair_distance,
            max_atom_pair_distance: p.max_atom_pair_distance,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConvergenceConfig {
    pub energy_threshold: Option<f64>,
    pub patience_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOptimizerConfig {
    pub niterations: Option<usize>,
    pub headexpand: Option<usize>,
    pub nexpand: Option<usize>,
    pub nsimulate: Option<usize>,
    pub nplayouts: Option<usize>,
    pub exploreconstant: Option<f64>,
    pub maxdepth: Option<usize>,
    pub max_mutation: Option<f64>,
    pub expansion_attempts: Option<usize>,
    pub convergence: Option<FileConvergenceConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEvaluatorConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub params: toml::Table,
}
