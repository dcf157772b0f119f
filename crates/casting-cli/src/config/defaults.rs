use casting::engine::config::{DEFAULT_SEED, OptimizerConfig};
use casting::engine::evaluators::PairPotentialEvaluator;

pub struct DefaultsConfig {
    pub seed: u64,
    pub angle: f64,
    pub optimizer: OptimizerConfig,
    pub evaluator: String,
    pub energy_threshold: f64,
    pub patience_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            angle: 90.0,
            optimizer: OptimizerConfig::default(),
            evaluator: PairPotentialEvaluator::NAME.to_string(),
            energy_threshold: 1e-4,
            patience_iterations: 50,
        }
    }
}
