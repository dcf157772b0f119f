//! Random cluster generation.
//!
//! A candidate is produced by carving a contiguous cluster out of an oversized FCC lattice with
//! a self-avoiding random walk over its nearest-neighbour graph, then dropping the cluster into
//! the centre of a randomly sampled periodic cell.

use crate::core::constraints::{self, Constraint, ConstraintError, Violation};
use crate::core::models::lattice::{LatticeBounds, LatticeError};
use crate::core::models::structure::{StructureData, StructureError};
use nalgebra::Vector3;
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, trace};

pub const MAX_WALK_ATTEMPTS: usize = 10_000;
pub const MAX_GENERATION_ATTEMPTS: usize = 1_000;
pub const DEFAULT_SITE_MULTIPLIER: usize = 10;

const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];
const NEIGHBOR_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Random walk could not grow a {target}-atom cluster after {attempts} restarts")]
    WalkExhausted { target: usize, attempts: usize },
    #[error("No valid structure after {attempts} attempts; last rejection: {last}")]
    Exhausted { attempts: usize, last: Violation },
    #[error("Invalid constraint: {0}")]
    Constraint(#[from] ConstraintError),
    #[error("Invalid lattice: {0}")]
    Lattice(#[from] LatticeError),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

/// Produces random starting structures that satisfy a [`Constraint`].
#[derive(Debug, Clone)]
pub struct GeometryGenerator {
    bounds: LatticeBounds,
    constraint: Arc<Constraint>,
    site_multiplier: usize,
}

impl GeometryGenerator {
    /// # Errors
    ///
    /// Returns an error if the constraint or lattice bounds are inconsistent.
    pub fn new(bounds: LatticeBounds, constraint: Arc<Constraint>) -> Result<Self, GenerationError> {
        constraint.validate()?;
        bounds.validate()?;
        Ok(Self {
            bounds,
            constraint,
            site_multiplier: DEFAULT_SITE_MULTIPLIER,
        })
    }

    /// Sets how many lattice sites are built per target atom (at least 1).
    pub fn with_site_multiplier(mut self, multiplier: usize) -> Self {
        self.site_multiplier = multiplier.max(1);
        self
    }

    pub fn constraint(&self) -> &Arc<Constraint> {
        &self.constraint
    }

    /// Generates a structure that passes [`constraints::check`].
    ///
    /// Candidates rejected by the checker (typically periodic images touching in a small cell)
    /// are discarded and resampled.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Exhausted`] if no valid candidate is found within
    /// [`MAX_GENERATION_ATTEMPTS`], or [`GenerationError::WalkExhausted`] if the random walk
    /// keeps stalling.
    #[instrument(level = "debug", skip_all)]
    pub fn generate(&self, rng: &mut impl Rng) -> Result<StructureData, GenerationError> {
        let mut last_violation = None;
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let candidate = self.sample_candidate(rng)?;
            match constraints::check(&candidate) {
                Ok(()) => {
                    debug!(
                        attempt,
                        formula = %candidate.formula(),
                        "Generated random structure."
                    );
                    return Ok(candidate);
                }
                Err(violation) => {
                    trace!(attempt, reason = %violation, "Generated candidate rejected; resampling.");
                    last_violation = Some(violation);
                }
            }
        }
        Err(GenerationError::Exhausted {
            attempts: MAX_GENERATION_ATTEMPTS,
            last: last_violation.unwrap_or(Violation::Fragmented { components: 0 }),
        })
    }

    fn sample_candidate(&self, rng: &mut impl Rng) -> Result<StructureData, GenerationError> {
        let species = sample_species(&self.constraint, rng);
        let natoms = species.len();

        let (dmin, dmax) = (
            self.constraint.min_atom_pair_distance,
            self.constraint.max_atom_pair_distance,
        );
        let spacing = if dmin == dmax {
            dmin
        } else {
            rng.gen_range(dmin..=dmax)
        };

        let sites = fcc_sites(natoms * self.site_multiplier, spacing);
        let neighbors = neighbor_lists(&sites, spacing * (1.0 + NEIGHBOR_TOLERANCE));
        let walk = random_walk(&neighbors, natoms, rng)?;

        let lattice = self.bounds.sample(rng)?;
        let cluster: Vec<Vector3<f64>> = walk.iter().map(|&i| sites[i]).collect();
        let centroid = cluster.iter().sum::<Vector3<f64>>() / natoms as f64;
        let box_centre = lattice.centre();

        let parameters = cluster
            .iter()
            .flat_map(|p| {
                let f = lattice.to_fractional(&(box_centre + (p - centroid)));
                [f.x, f.y, f.z]
            })
            .collect();

        Ok(StructureData::new(
            lattice,
            parameters,
            species,
            Arc::clone(&self.constraint),
        )?)
    }
}

/// Draws a shuffled species list for a random atom count.
///
/// The target count is uniform in `[min_num_atoms, max_num_atoms]`; it is truncated to whole
/// formula units (clamped into the feasible unit range) so each species count is an exact
/// multiple of its composition weight.
pub fn sample_species(constraint: &Constraint, rng: &mut impl Rng) -> Vec<String> {
    let weight = constraint.formula_weight().max(1);
    let (min_units, max_units) = constraint.formula_unit_range().unwrap_or((1, 1));

    let natoms = rng.gen_range(constraint.min_num_atoms..=constraint.max_num_atoms);
    let units = (natoms / weight).clamp(min_units, max_units);

    let mut species: Vec<String> = constraint
        .composition
        .iter()
        .flat_map(|(s, &w)| std::iter::repeat_n(s.clone(), units * w as usize))
        .collect();
    species.shuffle(rng);
    species
}

/// Cartesian sites of a cubic block of conventional FCC cells with at least `min_sites` sites
/// and nearest-neighbour distance `spacing`.
fn fcc_sites(min_sites: usize, spacing: f64) -> Vec<Vector3<f64>> {
    let a = spacing * std::f64::consts::SQRT_2;
    let mut cells = 1;
    while 4 * cells * cells * cells < min_sites {
        cells += 1;
    }

    let mut sites = Vec::with_capacity(4 * cells * cells * cells);
    for i in 0..cells {
        for j in 0..cells {
            for k in 0..cells {
                let origin = Vector3::new(i as f64, j as f64, k as f64);
                for basis in FCC_BASIS {
                    sites.push((origin + Vector3::from(basis)) * a);
                }
            }
        }
    }
    sites
}

fn neighbor_lists(sites: &[Vector3<f64>], cutoff: f64) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); sites.len()];
    for i in 0..sites.len() {
        for j in (i + 1)..sites.len() {
            if (sites[i] - sites[j]).norm() <= cutoff {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }
    neighbors
}

/// Self-avoiding walk of `target` sites, each step moving to a random unvisited neighbour of
/// the previous site. A stalled walk restarts from a fresh random site.
fn random_walk(
    neighbors: &[Vec<usize>],
    target: usize,
    rng: &mut impl Rng,
) -> Result<Vec<usize>, GenerationError> {
    let n = neighbors.len();
    if target == 0 || target > n {
        return Err(GenerationError::WalkExhausted {
            target,
            attempts: 0,
        });
    }

    let mut visited = vec![false; n];
    let mut candidates = Vec::new();
    for attempt in 1..=MAX_WALK_ATTEMPTS {
        visited.fill(false);
        let start = rng.gen_range(0..n);
        visited[start] = true;
        let mut path = vec![start];

        while path.len() < target {
            let last = path[path.len() - 1];
            candidates.clear();
            candidates.extend(neighbors[last].iter().copied().filter(|&j| !visited[j]));
            let Some(&next) = candidates.choose(rng) else {
                break;
            };
            visited[next] = true;
            path.push(next);
        }

        if path.len() == target {
            return Ok(path);
        }
        trace!(
            attempt,
            reached = path.len(),
            target,
            "Random walk stalled; restarting from a new site."
        );
    }
    Err(GenerationError::WalkExhausted {
        target,
        attempts: MAX_WALK_ATTEMPTS,
    })
}
