use crate::cli::GenerateArgs;
use crate::config::{GenerateAppConfig, build_generate_config};
use crate::error::{CliError, Result};
use casting::core::generation::GeometryGenerator;
use casting::core::io::traits::StructureFile;
use casting::core::io::xyz::{XyzFile, XyzFrame};
use casting::engine::error::EngineError;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::info;

pub async fn run(args: GenerateArgs) -> Result<()> {
    info!("Building configuration from {:?}", &args.config);
    let config = build_generate_config(&args)?;

    let pb = ProgressBar::new(config.count as u64);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .map_err(|e| CliError::Other(e.into()))?
            .progress_chars("━╸ "),
    );
    pb.set_message("Generating structures");

    let frames = tokio::task::block_in_place(|| generate(&config, || pb.inc(1)))?;
    pb.finish_and_clear();

    XyzFile::write_to_path(&frames, &config.output_path).map_err(|e| {
        CliError::FileParsing {
            path: config.output_path.clone(),
            source: e.into(),
        }
    })?;

    println!(
        "✓ Wrote {} structure(s) to {}",
        frames.len(),
        config.output_path.display()
    );
    Ok(())
}

fn generate(config: &GenerateAppConfig, on_generated: impl Fn()) -> Result<Vec<XyzFrame>> {
    let generator = GeometryGenerator::new(config.lattice.clone(), Arc::new(config.constraint.clone()))
        .map_err(EngineError::from)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut frames = Vec::with_capacity(config.count);
    for index in 0..config.count {
        let structure = generator.generate(&mut rng).map_err(EngineError::from)?;
        info!(
            index,
            formula = %structure.formula(),
            "Generated structure."
        );
        frames.push(XyzFrame::from_structure(&structure, None));
        on_generated();
    }
    Ok(frames)
}
