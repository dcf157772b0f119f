use crate::cli::SearchArgs;
use crate::config::build_search_config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use casting::{
    core::constraints::Constraint,
    core::io::{
        traits::StructureFile,
        xyz::{XyzFile, XyzFrame},
    },
    core::models::structure::StructureData,
    engine::{evaluators::EvaluatorRegistry, progress::ProgressReporter},
    workflows::{self, search::SearchResult},
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: SearchArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    info!("Building configuration from {:?}", &args.config);
    let app_config = build_search_config(&args)?;
    let config = &app_config.core_config;

    let initial = match &app_config.initial_path {
        Some(path) => {
            info!("Loading initial structure from {:?}", path);
            Some(load_initial(path, &config.constraint)?)
        }
        None => None,
    };

    let registry = EvaluatorRegistry::with_builtins();
    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting structure search with evaluator '{}' (seed {})...",
        config.evaluator.name, config.seed
    );
    info!("Invoking the core search workflow...");

    let result = tokio::task::block_in_place(|| match initial {
        Some(root) => workflows::search::run_with_root(root, config, &registry, &reporter),
        None => workflows::search::run(config, &registry, &reporter),
    })?;

    info!(
        energy = result.energy,
        found_valid = result.found_valid,
        iterations = result.iterations,
        nodes = result.tree_size,
        "Search workflow finished."
    );

    write_result(&result, &app_config.output_path)?;
    Ok(())
}

fn load_initial(path: &Path, constraint: &Constraint) -> Result<StructureData> {
    let parse_error = |source: anyhow::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source,
    };
    let frame = XyzFile::read_from_path(path)
        .map_err(|e| parse_error(e.into()))?
        .into_iter()
        .next()
        .ok_or_else(|| parse_error(anyhow::anyhow!("file contains no structures")))?;
    frame
        .into_structure(Arc::new(constraint.clone()))
        .map_err(|e| parse_error(e.into()))
}

/// Writes the best structure and prints a summary. Nothing is written when no structure
/// satisfied the constraints.
fn write_result(result: &SearchResult, output: &Path) -> Result<bool> {
    println!(
        "Search finished after {} iteration(s) with {} node(s) in the tree.",
        result.iterations, result.tree_size
    );

    if !result.found_valid {
        warn!("Search completed but found no structure satisfying the constraints.");
        println!("Warning: no valid structure found; nothing was written.");
        return Ok(false);
    }

    let frame = XyzFrame::from_structure(&result.structure, Some(result.energy));
    XyzFile::write_to_path(&[frame], output).map_err(|e| CliError::FileParsing {
        path: output.to_path_buf(),
        source: e.into(),
    })?;

    println!(
        "✓ Best structure ({}, energy {:.6} per atom) written to: {}",
        result.structure.formula(),
        result.energy,
        output.display()
    );
    Ok(true)
}
