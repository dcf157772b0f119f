//! The energy-evaluation boundary.
//!
//! An [`Evaluator`] scores a structure and may hand back a modified (for example relaxed) copy.
//! Its output is untrusted: the search maps non-finite energies to [`SENTINEL_ENERGY`], and a
//! returned `Err` aborts the run. Evaluators are created by name through an
//! [`EvaluatorRegistry`] so configuration files can select them.

mod external;
mod pair_potential;

pub use external::ExternalCommandEvaluator;
pub use pair_potential::PairPotentialEvaluator;

use super::config::{ConfigError, EvaluatorSpec};
use crate::core::models::structure::StructureData;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Energy reported for structures that are invalid or could not be scored.
pub const SENTINEL_ENERGY: f64 = 1e300;

#[inline]
pub fn is_sentinel(energy: f64) -> bool {
    energy >= SENTINEL_ENERGY
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluator '{evaluator}' is unavailable: {reason}")]
    Unavailable { evaluator: String, reason: String },
    #[error("Evaluator '{evaluator}' failed: {reason}")]
    Failed { evaluator: String, reason: String },
    #[error("I/O error while talking to the evaluator: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of scoring one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The structure the energy belongs to; may differ from the input after relaxation.
    pub structure: StructureData,
    /// Energy per atom, or [`SENTINEL_ENERGY`].
    pub energy: f64,
}

impl Evaluation {
    pub fn new(structure: StructureData, energy: f64) -> Self {
        Self { structure, energy }
    }

    pub fn rejected(structure: StructureData) -> Self {
        Self {
            structure,
            energy: SENTINEL_ENERGY,
        }
    }

    pub fn is_rejected(&self) -> bool {
        is_sentinel(self.energy)
    }

    /// Maps NaN and infinities to the sentinel, logging a warning, and clamps values above it.
    pub fn sanitized(mut self, evaluator: &str) -> Self {
        if !self.energy.is_finite() {
            warn!(
                evaluator,
                energy = self.energy,
                "Evaluator returned a non-finite energy; treating the structure as rejected."
            );
            self.energy = SENTINEL_ENERGY;
        } else if self.energy > SENTINEL_ENERGY {
            self.energy = SENTINEL_ENERGY;
        }
        self
    }
}

/// A black-box energy model.
///
/// Implementations must be shareable across the playout worker threads.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Verifies that external resources are reachable. Called once before the search starts.
    fn check_available(&self) -> Result<(), EvaluatorError> {
        Ok(())
    }

    /// Scores `structure`, returning an energy per atom.
    ///
    /// # Errors
    ///
    /// An `Err` signals that the evaluator itself is broken and the search cannot continue;
    /// structures that merely cannot be scored should come back as [`Evaluation::rejected`].
    fn evaluate(&self, structure: &StructureData) -> Result<Evaluation, EvaluatorError>;
}

pub type EvaluatorFactory =
    Box<dyn Fn(&toml::Table) -> Result<Box<dyn Evaluator>, ConfigError> + Send + Sync>;

/// Name-to-factory table used to build the evaluator named in the configuration.
pub struct EvaluatorRegistry {
    factories: BTreeMap<String, EvaluatorFactory>,
}

impl EvaluatorRegistry {
    /// A registry with no evaluators.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding the built-in `pair-potential` and `external-command` evaluators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(PairPotentialEvaluator::NAME, |params| {
            Ok(Box::new(PairPotentialEvaluator::from_params(params)?))
        });
        registry.register(ExternalCommandEvaluator::NAME, |params| {
            Ok(Box::new(ExternalCommandEvaluator::from_params(params)?))
        });
        registry
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&toml::Table) -> Result<Box<dyn Evaluator>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiates the evaluator described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownEvaluator`] for unregistered names, or whatever the
    /// factory reports for invalid parameters.
    pub fn create(&self, spec: &EvaluatorSpec) -> Result<Box<dyn Evaluator>, ConfigError> {
        let factory =
            self.factories
                .get(&spec.name)
                .ok_or_else(|| ConfigError::UnknownEvaluator {
                    name: spec.name.clone(),
                    available: self.names().map(String::from).collect(),
                })?;
        factory(&spec.params)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Deserializes an evaluator's free-form parameter table into its typed form.
pub(crate) fn parse_params<T: DeserializeOwned>(
    evaluator: &str,
    params: &toml::Table,
) -> Result<T, ConfigError> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::EvaluatorParams {
            evaluator: evaluator.to_string(),
            reason: e.message().to_string(),
        })
}
