use crate::core::models::structure::StructureData;
use rand::Rng;
use thiserror::Error;

pub const DEFAULT_MAX_MUTATION: f64 = 0.05;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerturbationError {
    #[error("Maximum mutation fraction must lie in (0, 1], got {0}")]
    InvalidFraction(f64),
}

/// Random displacement of fractional coordinates.
///
/// Every coordinate moves independently by a value drawn uniformly from `[-f, f]`, where `f` is
/// a fraction of the cell length along that axis. Species, atom order and lattice are untouched
/// and coordinates are not wrapped back into the unit cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    max_mutation: f64,
}

impl Perturbation {
    pub fn new(max_mutation: f64) -> Result<Self, PerturbationError> {
        if !(max_mutation > 0.0 && max_mutation <= 1.0) {
            return Err(PerturbationError::InvalidFraction(max_mutation));
        }
        Ok(Self { max_mutation })
    }

    pub fn max_mutation(&self) -> f64 {
        self.max_mutation
    }

    pub fn perturb(&self, structure: &StructureData, rng: &mut impl Rng) -> StructureData {
        let f = self.max_mutation;
        structure.map_parameters(|x| x + rng.gen_range(-f..=f))
    }

    /// Applies `steps` successive perturbations, each starting from the previous result.
    pub fn perturb_chain(
        &self,
        structure: &StructureData,
        steps: usize,
        rng: &mut impl Rng,
    ) -> StructureData {
        let mut current = structure.clone();
        for _ in 0..steps {
            current = self.perturb(&current, rng);
        }
        current
    }
}

impl Default for Perturbation {
    fn default() -> Self {
        Self {
            max_mutation: DEFAULT_MAX_MUTATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::models::lattice::Lattice;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn sample_structure() -> StructureData {
        StructureData::new(
            Lattice::from_parameters(10.0, 11.0, 12.0, 90.0, 100.0, 90.0).unwrap(),
            vec![0.4, 0.5, 0.5, 0.6, 0.5, 0.5, 0.5, 0.6, 0.45],
            vec!["Cu".into(), "Ag".into(), "Cu".into()],
            Arc::new(Constraint::single_species("Cu", 1, 4, 2.0, 3.0)),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_fractions_outside_unit_interval() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            assert!(Perturbation::new(bad).is_err(), "{bad} accepted");
        }
        assert!(Perturbation::new(1.0).is_ok());
        assert_eq!(Perturbation::default().max_mutation(), DEFAULT_MAX_MUTATION);
    }

    #[test]
    fn perturb_preserves_species_order_and_lattice() {
        let original = sample_structure();
        let perturbation = Perturbation::new(0.05).unwrap();
        let moved = perturbation.perturb(&original, &mut StdRng::seed_from_u64(1));

        assert_eq!(moved.species(), original.species());
        assert_eq!(moved.lattice(), original.lattice());
        assert_eq!(moved.parameters().len(), original.parameters().len());
        assert_ne!(moved.parameters(), original.parameters());
    }

    #[test]
    fn displacements_are_bounded_by_fraction() {
        let original = sample_structure();
        let perturbation = Perturbation::new(0.02).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let moved = perturbation.perturb(&original, &mut rng);
            for (a, b) in moved.parameters().iter().zip(original.parameters()) {
                assert!((a - b).abs() <= 0.02 + 1e-15);
            }
        }
    }

    #[test]
    fn chain_displacement_is_bounded_by_steps_times_fraction() {
        let original = sample_structure();
        let perturbation = Perturbation::new(0.01).unwrap();
        let moved = perturbation.perturb_chain(&original, 10, &mut StdRng::seed_from_u64(3));
        for (a, b) in moved.parameters().iter().zip(original.parameters()) {
            assert!((a - b).abs() <= 0.1 + 1e-12);
        }
        let unchanged = perturbation.perturb_chain(&original, 0, &mut StdRng::seed_from_u64(3));
        assert_eq!(unchanged, original);
    }

    #[test]
    fn same_rng_state_gives_identical_output() {
        let original = sample_structure();
        let perturbation = Perturbation::default();
        let a = perturbation.perturb_chain(&original, 5, &mut StdRng::seed_from_u64(11));
        let b = perturbation.perturb_chain(&original, 5, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
