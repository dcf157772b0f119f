use crate::core::constraints::{Constraint, ConstraintError};
use crate::core::models::lattice::{LatticeBounds, LatticeError};
use thiserror::Error;

pub const DEFAULT_SEED: u64 = 12;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Unknown evaluator '{name}' (available: {})", .available.join(", "))]
    UnknownEvaluator {
        name: String,
        available: Vec<String>,
    },
    #[error("Invalid parameters for evaluator '{evaluator}': {reason}")]
    EvaluatorParams { evaluator: String, reason: String },
    #[error("Invalid constraint: {0}")]
    Constraint(#[from] ConstraintError),
    #[error("Invalid lattice bounds: {0}")]
    Lattice(#[from] LatticeError),
}

/// Early stopping on stagnation of the best energy found so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceConfig {
    pub energy_threshold: f64,
    pub patience_iterations: usize,
}

/// Tree-search hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub niterations: usize,
    /// Children created when the root is expanded.
    pub headexpand: usize,
    /// Children created when any deeper node is expanded.
    pub nexpand: usize,
    /// Independent playouts per simulation.
    pub nsimulate: usize,
    /// Chained perturbations per playout.
    pub nplayouts: usize,
    pub exploreconstant: f64,
    pub maxdepth: usize,
    /// Maximum displacement per coordinate, as a fraction of the cell length.
    pub max_mutation: f64,
    /// Perturbation retries per expansion candidate before it is recorded as rejected.
    pub expansion_attempts: usize,
    pub convergence: Option<ConvergenceConfig>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            niterations: 2000,
            headexpand: 10,
            nexpand: 3,
            nsimulate: 3,
            nplayouts: 10,
            exploreconstant: 1.0,
            maxdepth: 12,
            max_mutation: 0.05,
            expansion_attempts: 10,
            convergence: None,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("headexpand", self.headexpand),
            ("nexpand", self.nexpand),
            ("nsimulate", self.nsimulate),
            ("expansion_attempts", self.expansion_attempts),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be at least 1"));
            }
        }
        if !self.exploreconstant.is_finite() || self.exploreconstant < 0.0 {
            return Err(invalid(
                "exploreconstant",
                format!("must be a finite non-negative number, got {}", self.exploreconstant),
            ));
        }
        if !(self.max_mutation > 0.0 && self.max_mutation <= 1.0) {
            return Err(invalid(
                "max_mutation",
                format!("must lie in (0, 1], got {}", self.max_mutation),
            ));
        }
        if let Some(convergence) = &self.convergence {
            if !convergence.energy_threshold.is_finite() || convergence.energy_threshold < 0.0 {
                return Err(invalid(
                    "convergence.energy_threshold",
                    format!(
                        "must be a finite non-negative number, got {}",
                        convergence.energy_threshold
                    ),
                ));
            }
            if convergence.patience_iterations == 0 {
                return Err(invalid(
                    "convergence.patience_iterations",
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

/// Names an evaluator in the registry together with its free-form parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorSpec {
    pub name: String,
    pub params: toml::Table,
}

impl EvaluatorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: toml::Table::new(),
        }
    }

    pub fn with_params(mut self, params: toml::Table) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub seed: u64,
    pub lattice: LatticeBounds,
    pub constraint: Constraint,
    pub optimizer: OptimizerConfig,
    pub evaluator: EvaluatorSpec,
}

impl SearchConfig {
    /// Checks every section for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found; no search state is created by a config that fails
    /// here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.constraint.validate()?;
        self.lattice.validate()?;
        self.optimizer.validate()?;
        if self.evaluator.name.trim().is_empty() {
            return Err(invalid("evaluator.name", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SearchConfigBuilder {
    seed: Option<u64>,
    lattice: Option<LatticeBounds>,
    constraint: Option<Constraint>,
    optimizer: Option<OptimizerConfig>,
    evaluator: Option<EvaluatorSpec>,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn lattice(mut self, bounds: LatticeBounds) -> Self {
        self.lattice = Some(bounds);
        self
    }
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = Some(optimizer);
        self
    }
    pub fn evaluator(mut self, spec: EvaluatorSpec) -> Self {
        self.evaluator = Some(spec);
        self
    }

    /// Assembles and validates the configuration. `seed` and `optimizer` fall back to
    /// [`DEFAULT_SEED`] and [`OptimizerConfig::default`].
    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let config = SearchConfig {
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            lattice: self
                .lattice
                .ok_or(ConfigError::MissingParameter("lattice"))?,
            constraint: self
                .constraint
                .ok_or(ConfigError::MissingParameter("constraint"))?,
            optimizer: self.optimizer.unwrap_or_default(),
            evaluator: self
                .evaluator
                .ok_or(ConfigError::MissingParameter("evaluator"))?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}
