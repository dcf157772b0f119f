use super::potentials::{
    lennard_jones_12_6, lennard_jones_12_6_derivative, morse, morse_derivative,
};
use crate::core::models::structure::StructureData;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Isotropic pair interaction between two atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairPotential {
    LennardJones { r_min: f64, well_depth: f64 },
    Morse { r_min: f64, well_depth: f64, alpha: f64 },
}

impl PairPotential {
    #[inline]
    pub fn energy(&self, dist: f64) -> f64 {
        match *self {
            Self::LennardJones { r_min, well_depth } => lennard_jones_12_6(dist, r_min, well_depth),
            Self::Morse {
                r_min,
                well_depth,
                alpha,
            } => morse(dist, r_min, well_depth, alpha),
        }
    }

    #[inline]
    pub fn derivative(&self, dist: f64) -> f64 {
        match *self {
            Self::LennardJones { r_min, well_depth } => {
                lennard_jones_12_6_derivative(dist, r_min, well_depth)
            }
            Self::Morse {
                r_min,
                well_depth,
                alpha,
            } => morse_derivative(dist, r_min, well_depth, alpha),
        }
    }
}

/// Pair potentials keyed by unordered species pair, with a fallback for unlisted pairs.
///
/// Interactions are summed over minimum-image pairs within `cutoff`, so the cutoff should not
/// exceed half the shortest cell width.
#[derive(Debug, Clone, PartialEq)]
pub struct PairTable {
    default: PairPotential,
    overrides: HashMap<(String, String), PairPotential>,
    cutoff: f64,
}

impl PairTable {
    pub fn new(default: PairPotential, cutoff: f64) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            cutoff,
        }
    }

    pub fn with_pair(mut self, a: &str, b: &str, potential: PairPotential) -> Self {
        self.overrides.insert(pair_key(a, b), potential);
        self
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn get(&self, a: &str, b: &str) -> &PairPotential {
        self.overrides.get(&pair_key(a, b)).unwrap_or(&self.default)
    }

    /// Total pair energy of `structure`.
    pub fn energy(&self, structure: &StructureData) -> f64 {
        self.accumulate(structure, false).0
    }

    /// Total pair energy and the Cartesian force on every atom.
    pub fn energy_and_forces(&self, structure: &StructureData) -> (f64, Vec<Vector3<f64>>) {
        self.accumulate(structure, true)
    }

    fn accumulate(&self, structure: &StructureData, with_forces: bool) -> (f64, Vec<Vector3<f64>>) {
        let lattice = structure.lattice();
        let species = structure.species();
        let frac = structure.fractional_coords();
        let n = frac.len();
        let (kinds, potentials) = self.resolve(species);

        let mut energy = 0.0;
        let mut forces = if with_forces {
            vec![Vector3::zeros(); n]
        } else {
            Vec::new()
        };

        for i in 0..n {
            for j in (i + 1)..n {
                let d = lattice.minimum_image(&frac[i], &frac[j]);
                let r = d.norm();
                if r > self.cutoff {
                    continue;
                }
                let potential = potentials[kinds[i]][kinds[j]];
                energy += potential.energy(r);
                if with_forces && r > 0.0 {
                    let f = d * (potential.derivative(r) / r);
                    forces[i] += f;
                    forces[j] -= f;
                }
            }
        }
        (energy, forces)
    }

    /// Maps each atom to a species index and builds the potential matrix between species, so
    /// the pair loop does no lookups.
    fn resolve<'a>(&'a self, species: &[String]) -> (Vec<usize>, Vec<Vec<&'a PairPotential>>) {
        let mut distinct: Vec<&str> = Vec::new();
        let kinds = species
            .iter()
            .map(|s| match distinct.iter().position(|d| *d == s.as_str()) {
                Some(index) => index,
                None => {
                    distinct.push(s);
                    distinct.len() - 1
                }
            })
            .collect();
        let potentials = distinct
            .iter()
            .map(|a| {
                distinct
                    .iter()
                    .map(|b| {
                        if self.overrides.is_empty() {
                            &self.default
                        } else {
                            self.get(a, b)
                        }
                    })
                    .collect()
            })
            .collect();
        (kinds, potentials)
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::models::lattice::Lattice;
    use nalgebra::Point3;
    use std::sync::Arc;

    const LJ: PairPotential = PairPotential::LennardJones {
        r_min: 2.5,
        well_depth: 1.0,
    };

    fn dimer(separation: f64, a: &str, b: &str) -> StructureData {
        StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[Point3::new(9.0, 10.0, 10.0), Point3::new(9.0 + separation, 10.0, 10.0)],
            vec![a.to_string(), b.to_string()],
            Arc::new(Constraint::single_species("Cu", 2, 2, 2.0, 3.0)),
        )
        .unwrap()
    }

    #[test]
    fn dimer_at_r_min_has_negative_well_depth_and_no_force() {
        let table = PairTable::new(LJ, 8.0);
        let (energy, forces) = table.energy_and_forces(&dimer(2.5, "Cu", "Cu"));
        assert!((energy + 1.0).abs() < 1e-9);
        assert!(forces.iter().all(|f| f.norm() < 1e-9));
    }

    #[test]
    fn compressed_dimer_is_pushed_apart() {
        let table = PairTable::new(LJ, 8.0);
        let (_, forces) = table.energy_and_forces(&dimer(2.2, "Cu", "Cu"));
        assert!(forces[0].x < 0.0);
        assert!(forces[1].x > 0.0);
        assert!((forces[0] + forces[1]).norm() < 1e-9);
    }

    #[test]
    fn pairs_beyond_cutoff_do_not_contribute() {
        let table = PairTable::new(LJ, 3.0);
        assert_eq!(table.energy(&dimer(3.5, "Cu", "Cu")), 0.0);
    }

    #[test]
    fn species_overrides_are_order_independent() {
        let morse = PairPotential::Morse {
            r_min: 2.7,
            well_depth: 0.5,
            alpha: 1.3,
        };
        let table = PairTable::new(LJ, 8.0).with_pair("Cu", "Ag", morse);
        assert_eq!(table.get("Ag", "Cu"), &morse);
        assert_eq!(table.get("Cu", "Ag"), &morse);
        assert_eq!(table.get("Cu", "Cu"), &LJ);
        let e = table.energy(&dimer(2.7, "Ag", "Cu"));
        assert!((e + 0.5).abs() < 1e-9);
    }

    #[test]
    fn mixed_cluster_energy_sums_each_pair_with_its_own_potential() {
        let morse = PairPotential::Morse {
            r_min: 2.7,
            well_depth: 0.5,
            alpha: 1.3,
        };
        let table = PairTable::new(LJ, 8.0).with_pair("Ag", "Cu", morse);
        let structure = StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[
                Point3::new(8.0, 10.0, 10.0),
                Point3::new(10.5, 10.0, 10.0),
                Point3::new(13.2, 10.0, 10.0),
            ],
            vec!["Cu".into(), "Cu".into(), "Ag".into()],
            Arc::new(Constraint::single_species("Cu", 3, 3, 2.0, 3.0)),
        )
        .unwrap();

        let expected = LJ.energy(2.5) + morse.energy(5.2) + morse.energy(2.7);
        assert!((table.energy(&structure) - expected).abs() < 1e-9);
    }

    #[test]
    fn energy_uses_periodic_minimum_image() {
        let table = PairTable::new(LJ, 8.0);
        let structure = StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[Point3::new(0.5, 10.0, 10.0), Point3::new(18.0, 10.0, 10.0)],
            vec!["Cu".into(), "Cu".into()],
            Arc::new(Constraint::single_species("Cu", 2, 2, 2.0, 3.0)),
        )
        .unwrap();
        assert!((table.energy(&structure) + 1.0).abs() < 1e-9);
    }
}
