use super::config::OptimizerConfig;
use super::evaluators::Evaluator;
use super::progress::ProgressReporter;
use crate::core::perturbation::Perturbation;

/// Read-only state shared by the search tasks of one run.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub config: &'a OptimizerConfig,
    pub evaluator: &'a dyn Evaluator,
    pub perturbation: Perturbation,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        config: &'a OptimizerConfig,
        evaluator: &'a dyn Evaluator,
        perturbation: Perturbation,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            config,
            evaluator,
            perturbation,
            reporter,
        }
    }
}
