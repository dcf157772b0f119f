use super::{Evaluation, Evaluator, EvaluatorError, parse_params};
use crate::core::constraints;
use crate::core::forcefield::pair::{PairPotential, PairTable};
use crate::core::models::structure::StructureData;
use crate::engine::config::ConfigError;
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
enum PotentialKind {
    #[default]
    LennardJones,
    Morse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PairOverride {
    potential: Option<PotentialKind>,
    well_depth: Option<f64>,
    r_min: Option<f64>,
    alpha: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PairPotentialParams {
    #[serde(default)]
    potential: PotentialKind,
    #[serde(default = "default_well_depth")]
    well_depth: f64,
    #[serde(default = "default_r_min")]
    r_min: f64,
    #[serde(default = "default_alpha")]
    alpha: f64,
    #[serde(default = "default_cutoff")]
    cutoff: f64,
    #[serde(default)]
    relax_steps: usize,
    #[serde(default = "default_step_size")]
    step_size: f64,
    #[serde(default = "default_max_displacement")]
    max_displacement: f64,
    #[serde(default = "default_force_tolerance")]
    force_tolerance: f64,
    /// Per-pair overrides keyed by `"A-B"`.
    #[serde(default)]
    pairs: BTreeMap<String, PairOverride>,
}

fn default_well_depth() -> f64 {
    1.0
}
fn default_r_min() -> f64 {
    2.5
}
fn default_alpha() -> f64 {
    1.5
}
fn default_cutoff() -> f64 {
    6.0
}
fn default_step_size() -> f64 {
    0.01
}
fn default_max_displacement() -> f64 {
    0.1
}
fn default_force_tolerance() -> f64 {
    1e-3
}

/// Steepest-descent settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relaxation {
    pub steps: usize,
    pub step_size: f64,
    pub max_displacement: f64,
    pub force_tolerance: f64,
}

/// Reference evaluator scoring structures with classical pair potentials.
///
/// Structures are checked against their constraint before scoring and again after the optional
/// relaxation; a structure failing either check is reported with the sentinel energy.
#[derive(Debug, Clone)]
pub struct PairPotentialEvaluator {
    table: PairTable,
    relaxation: Option<Relaxation>,
}

impl PairPotentialEvaluator {
    pub const NAME: &'static str = "pair-potential";

    pub fn new(table: PairTable) -> Self {
        Self {
            table,
            relaxation: None,
        }
    }

    pub fn with_relaxation(mut self, relaxation: Relaxation) -> Self {
        self.relaxation = (relaxation.steps > 0).then_some(relaxation);
        self
    }

    pub fn from_params(params: &toml::Table) -> Result<Self, ConfigError> {
        let p: PairPotentialParams = parse_params(Self::NAME, params)?;
        let error = |reason: String| ConfigError::EvaluatorParams {
            evaluator: Self::NAME.to_string(),
            reason,
        };

        for (name, value) in [
            ("r-min", p.r_min),
            ("cutoff", p.cutoff),
            ("step-size", p.step_size),
            ("max-displacement", p.max_displacement),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(error(format!("'{name}' must be positive, got {value}")));
            }
        }
        if !p.well_depth.is_finite() || !p.alpha.is_finite() || !p.force_tolerance.is_finite() {
            return Err(error("potential parameters must be finite".to_string()));
        }

        let build = |kind: PotentialKind, well_depth: f64, r_min: f64, alpha: f64| match kind {
            PotentialKind::LennardJones => PairPotential::LennardJones { r_min, well_depth },
            PotentialKind::Morse => PairPotential::Morse {
                r_min,
                well_depth,
                alpha,
            },
        };

        let mut table = PairTable::new(
            build(p.potential, p.well_depth, p.r_min, p.alpha),
            p.cutoff,
        );
        for (key, o) in &p.pairs {
            let Some((a, b)) = key.split_once('-') else {
                return Err(error(format!(
                    "pair key '{key}' must have the form 'A-B'"
                )));
            };
            let potential = build(
                o.potential.unwrap_or(p.potential),
                o.well_depth.unwrap_or(p.well_depth),
                o.r_min.unwrap_or(p.r_min),
                o.alpha.unwrap_or(p.alpha),
            );
            table = table.with_pair(a.trim(), b.trim(), potential);
        }

        Ok(Self::new(table).with_relaxation(Relaxation {
            steps: p.relax_steps,
            step_size: p.step_size,
            max_displacement: p.max_displacement,
            force_tolerance: p.force_tolerance,
        }))
    }

    /// Energy per atom without relaxation or constraint checks.
    pub fn energy_per_atom(&self, structure: &StructureData) -> f64 {
        let n = structure.num_atoms().max(1);
        self.table.energy(structure) / n as f64
    }

    fn relax(&self, structure: &StructureData, relaxation: &Relaxation) -> Option<StructureData> {
        let lattice = structure.lattice();
        let mut current = structure.clone();
        let (mut energy, mut forces) = self.table.energy_and_forces(&current);
        let mut step = relaxation.step_size;

        for iteration in 0..relaxation.steps {
            let max_force = forces.iter().map(|f| f.norm()).fold(0.0, f64::max);
            if max_force < relaxation.force_tolerance {
                trace!(iteration, max_force, "Relaxation converged.");
                break;
            }

            let positions: Vec<Point3<f64>> = current
                .cartesian_coords()
                .iter()
                .zip(&forces)
                .map(|(p, f)| {
                    let mut displacement = f * step;
                    let norm = displacement.norm();
                    if norm > relaxation.max_displacement {
                        displacement *= relaxation.max_displacement / norm;
                    }
                    p + displacement
                })
                .collect();
            let trial = StructureData::from_cartesian(
                lattice.clone(),
                &positions,
                current.species().to_vec(),
                current.constraint().clone(),
            )
            .ok()?;

            let (trial_energy, trial_forces) = self.table.energy_and_forces(&trial);
            if trial_energy <= energy {
                current = trial;
                energy = trial_energy;
                forces = trial_forces;
                step *= 1.1;
            } else {
                step *= 0.5;
            }
        }
        Some(current)
    }
}

impl Evaluator for PairPotentialEvaluator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, structure: &StructureData) -> Result<Evaluation, EvaluatorError> {
        if !constraints::is_valid(structure) {
            return Ok(Evaluation::rejected(structure.clone()));
        }

        let Some(relaxation) = &self.relaxation else {
            return Ok(Evaluation::new(
                structure.clone(),
                self.energy_per_atom(structure),
            ));
        };

        let Some(relaxed) = self.relax(structure, relaxation) else {
            warn!("Relaxation produced non-finite coordinates; rejecting structure.");
            return Ok(Evaluation::rejected(structure.clone()));
        };
        if !constraints::is_valid(&relaxed) {
            return Ok(Evaluation::rejected(relaxed));
        }
        let energy = self.energy_per_atom(&relaxed);
        Ok(Evaluation::new(relaxed, energy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::models::lattice::Lattice;
    use crate::engine::evaluators::SENTINEL_ENERGY;
    use std::sync::Arc;

    fn dimer(separation: f64) -> StructureData {
        StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[
                Point3::new(9.0, 10.0, 10.0),
                Point3::new(9.0 + separation, 10.0, 10.0),
            ],
            vec!["Cu".into(), "Cu".into()],
            Arc::new(Constraint::single_species("Cu", 2, 2, 2.0, 3.2)),
        )
        .unwrap()
    }

    fn params(source: &str) -> toml::Table {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn default_params_score_lennard_jones_dimer_per_atom() {
        let evaluator = PairPotentialEvaluator::from_params(&toml::Table::new()).unwrap();
        let evaluation = evaluator.evaluate(&dimer(2.5)).unwrap();
        assert!((evaluation.energy + 0.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_structure_is_scored_with_sentinel() {
        let evaluator = PairPotentialEvaluator::from_params(&toml::Table::new()).unwrap();
        let evaluation = evaluator.evaluate(&dimer(1.0)).unwrap();
        assert_eq!(evaluation.energy, SENTINEL_ENERGY);
    }

    #[test]
    fn morse_params_and_pair_overrides_are_parsed() {
        let evaluator = PairPotentialEvaluator::from_params(&params(
            r#"
            potential = "morse"
            well-depth = 0.3
            r-min = 2.6
            alpha = 1.4
            [pairs."Cu-Cu"]
            well-depth = 0.8
            "#,
        ))
        .unwrap();
        let energy = evaluator.energy_per_atom(&dimer(2.6));
        assert!((energy + 0.4).abs() < 1e-9);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(matches!(
            PairPotentialEvaluator::from_params(&params("epsilon = 1.0")),
            Err(ConfigError::EvaluatorParams { .. })
        ));
        assert!(matches!(
            PairPotentialEvaluator::from_params(&params("cutoff = -1.0")),
            Err(ConfigError::EvaluatorParams { .. })
        ));
        assert!(matches!(
            PairPotentialEvaluator::from_params(&params("[pairs.CuAg]\nr-min = 2.0")),
            Err(ConfigError::EvaluatorParams { .. })
        ));
    }

    #[test]
    fn relaxation_lowers_energy_and_returns_moved_structure() {
        let evaluator = PairPotentialEvaluator::from_params(&params(
            r#"
            relax-steps = 200
            step-size = 0.005
            "#,
        ))
        .unwrap();
        let start = dimer(2.9);
        let unrelaxed = evaluator.energy_per_atom(&start);
        let evaluation = evaluator.evaluate(&start).unwrap();
        assert!(evaluation.energy < unrelaxed);
        assert_ne!(evaluation.structure, start);
        let cart = evaluation.structure.cartesian_coords();
        let separation = (cart[1] - cart[0]).norm();
        assert!((separation - 2.5).abs() < 0.1);
    }
}
