use thiserror::Error;

use super::config::ConfigError;
use super::evaluators::EvaluatorError;
use crate::core::generation::GenerationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Initial structure generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
