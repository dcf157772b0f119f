//! Composition and geometry constraints, and the predicate that enforces them.

use crate::core::models::structure::StructureData;
use crate::core::utils::graph::{adjacency_within, count_components};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("Composition must name at least one species")]
    EmptyComposition,
    #[error("Composition weight of '{0}' must be a positive integer")]
    ZeroWeight(String),
    #[error("Invalid atom count range: min {min}, max {max}")]
    AtomCountRange { min: usize, max: usize },
    #[error("Invalid pair distance range: min {min}, max {max}")]
    DistanceRange { min: f64, max: f64 },
    #[error(
        "No atom count in [{min}, {max}] is a whole number of formula units (formula weight {formula_weight})"
    )]
    NoFeasibleCount {
        min: usize,
        max: usize,
        formula_weight: usize,
    },
}

/// The constraints every candidate structure must satisfy.
///
/// `composition` maps a species label to its integer weight in one formula unit. A structure is
/// compositionally valid when each species count is an exact multiple of its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub min_num_atoms: usize,
    pub max_num_atoms: usize,
    pub composition: BTreeMap<String, u32>,
    pub min_atom_pair_distance: f64,
    pub max_atom_pair_distance: f64,
}

impl Constraint {
    pub fn single_species(
        species: &str,
        min_num_atoms: usize,
        max_num_atoms: usize,
        min_atom_pair_distance: f64,
        max_atom_pair_distance: f64,
    ) -> Self {
        Self {
            min_num_atoms,
            max_num_atoms,
            composition: BTreeMap::from([(species.to_string(), 1)]),
            min_atom_pair_distance,
            max_atom_pair_distance,
        }
    }

    /// Total number of atoms in one formula unit.
    pub fn formula_weight(&self) -> usize {
        self.composition.values().map(|&w| w as usize).sum()
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.composition.keys().map(String::as_str)
    }

    /// Inclusive range of formula-unit counts whose atom totals fall inside the atom bounds.
    pub fn formula_unit_range(&self) -> Option<(usize, usize)> {
        let weight = self.formula_weight();
        if weight == 0 {
            return None;
        }
        let min_units = self.min_num_atoms.div_ceil(weight).max(1);
        let max_units = self.max_num_atoms / weight;
        (min_units <= max_units).then_some((min_units, max_units))
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        if self.composition.is_empty() {
            return Err(ConstraintError::EmptyComposition);
        }
        if let Some((species, _)) = self.composition.iter().find(|(_, w)| **w == 0) {
            return Err(ConstraintError::ZeroWeight(species.clone()));
        }
        if self.min_num_atoms == 0 || self.min_num_atoms > self.max_num_atoms {
            return Err(ConstraintError::AtomCountRange {
                min: self.min_num_atoms,
                max: self.max_num_atoms,
            });
        }
        let (dmin, dmax) = (self.min_atom_pair_distance, self.max_atom_pair_distance);
        if !dmin.is_finite() || !dmax.is_finite() || dmin <= 0.0 || dmin > dmax {
            return Err(ConstraintError::DistanceRange {
                min: dmin,
                max: dmax,
            });
        }
        if self.formula_unit_range().is_none() {
            return Err(ConstraintError::NoFeasibleCount {
                min: self.min_num_atoms,
                max: self.max_num_atoms,
                formula_weight: self.formula_weight(),
            });
        }
        Ok(())
    }
}

/// The first rule a candidate structure broke.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Violation {
    #[error("atom count {count} outside [{min}, {max}]")]
    AtomCount { count: usize, min: usize, max: usize },
    #[error("species {observed:?} do not match composition {expected:?}")]
    SpeciesMismatch {
        observed: Vec<String>,
        expected: Vec<String>,
    },
    #[error("{count} atoms of {species} is not a multiple of weight {weight}")]
    Composition {
        species: String,
        count: usize,
        weight: u32,
    },
    #[error("atoms {i} and {j} overlap at {distance:.3} A (minimum {min})")]
    Overlap {
        i: usize,
        j: usize,
        distance: f64,
        min: f64,
    },
    #[error("cluster is fragmented into {components} components")]
    Fragmented { components: usize },
}

/// Checks `structure` against the constraint it carries.
pub fn check(structure: &StructureData) -> Result<(), Violation> {
    check_against(structure, structure.constraint())
}

/// Checks `structure` against `constraint`, short-circuiting on the first violation.
///
/// Rules, in order: atom count, species set, per-species divisibility by the composition
/// weight, minimum pair distance, and single-component connectivity of the contact graph. All
/// distances use the periodic minimum image.
pub fn check_against(structure: &StructureData, constraint: &Constraint) -> Result<(), Violation> {
    let count = structure.num_atoms();
    if count < constraint.min_num_atoms || count > constraint.max_num_atoms {
        return Err(Violation::AtomCount {
            count,
            min: constraint.min_num_atoms,
            max: constraint.max_num_atoms,
        });
    }

    let counts = structure.species_counts();
    let observed: BTreeSet<&str> = counts.keys().copied().collect();
    let expected: BTreeSet<&str> = constraint.species().collect();
    if observed != expected {
        return Err(Violation::SpeciesMismatch {
            observed: observed.into_iter().map(String::from).collect(),
            expected: expected.into_iter().map(String::from).collect(),
        });
    }

    for (species, &weight) in &constraint.composition {
        let n = counts.get(species.as_str()).copied().unwrap_or(0);
        if n % weight as usize != 0 {
            return Err(Violation::Composition {
                species: species.clone(),
                count: n,
                weight,
            });
        }
    }

    let distances = structure
        .lattice()
        .distance_matrix(&structure.fractional_coords());

    let min = constraint.min_atom_pair_distance;
    for i in 0..count {
        for j in (i + 1)..count {
            let distance = distances[(i, j)];
            if distance < min {
                return Err(Violation::Overlap {
                    i,
                    j,
                    distance,
                    min,
                });
            }
        }
    }

    let adjacency = adjacency_within(&distances, constraint.max_atom_pair_distance);
    let components = count_components(&adjacency);
    if components > 1 {
        return Err(Violation::Fragmented { components });
    }

    Ok(())
}

/// Returns `true` when `structure` satisfies its constraint; rejections are logged at debug
/// level with their reason.
pub fn is_valid(structure: &StructureData) -> bool {
    match check(structure) {
        Ok(()) => true,
        Err(violation) => {
            debug!(reason = %violation, "Candidate structure rejected.");
            false
        }
    }
}
