use crate::error::Result;
use casting::engine::evaluators::EvaluatorRegistry;
use tracing::info;

pub async fn run() -> Result<()> {
    let registry = EvaluatorRegistry::with_builtins();
    let names = list(&registry);
    info!(count = names.len(), "Listing registered evaluators.");

    println!("Available evaluators:");
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

fn list(registry: &EvaluatorRegistry) -> Vec<String> {
    registry.names().map(String::from).collect()
}
