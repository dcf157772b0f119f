use super::lattice::Lattice;
use crate::core::constraints::Constraint;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    #[error("Coordinate list of length {parameters} does not match 3 x {atoms} atoms")]
    LengthMismatch { parameters: usize, atoms: usize },
    #[error("Coordinate {index} is not a finite number")]
    NonFinite { index: usize },
}

/// An immutable periodic atomic arrangement.
///
/// Positions are stored as a flat list of fractional coordinates (`x0, y0, z0, x1, ...`) which
/// is positionally aligned with `species`. The two lists are never reordered independently;
/// every constructor enforces `parameters.len() == 3 * species.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureData {
    lattice: Lattice,
    parameters: Vec<f64>,
    species: Vec<String>,
    constraint: Arc<Constraint>,
}

impl StructureData {
    /// Creates a structure from flattened fractional coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::LengthMismatch`] if the coordinate list does not hold exactly
    /// three values per species label, or [`StructureError::NonFinite`] for NaN/infinite input.
    pub fn new(
        lattice: Lattice,
        parameters: Vec<f64>,
        species: Vec<String>,
        constraint: Arc<Constraint>,
    ) -> Result<Self, StructureError> {
        if parameters.len() != 3 * species.len() {
            return Err(StructureError::LengthMismatch {
                parameters: parameters.len(),
                atoms: species.len(),
            });
        }
        if let Some(index) = parameters.iter().position(|x| !x.is_finite()) {
            return Err(StructureError::NonFinite { index });
        }
        Ok(Self {
            lattice,
            parameters,
            species,
            constraint,
        })
    }

    /// Creates a structure from Cartesian positions, converting them to fractional coordinates
    /// of `lattice`.
    pub fn from_cartesian(
        lattice: Lattice,
        positions: &[Point3<f64>],
        species: Vec<String>,
        constraint: Arc<Constraint>,
    ) -> Result<Self, StructureError> {
        let parameters = positions
            .iter()
            .flat_map(|p| {
                let f = lattice.to_fractional(&p.coords);
                [f.x, f.y, f.z]
            })
            .collect();
        Self::new(lattice, parameters, species, constraint)
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn constraint(&self) -> &Arc<Constraint> {
        &self.constraint
    }

    pub fn num_atoms(&self) -> usize {
        self.species.len()
    }

    pub fn fractional_coords(&self) -> Vec<Vector3<f64>> {
        self.parameters
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect()
    }

    pub fn cartesian_coords(&self) -> Vec<Point3<f64>> {
        self.fractional_coords()
            .iter()
            .map(|f| Point3::from(self.lattice.to_cartesian(f)))
            .collect()
    }

    /// Returns a copy with every coordinate passed through `displace`.
    ///
    /// Lattice, species and constraint are shared unchanged; the atom count cannot change.
    pub fn map_parameters(&self, mut displace: impl FnMut(f64) -> f64) -> Self {
        Self {
            lattice: self.lattice.clone(),
            parameters: self.parameters.iter().map(|&x| displace(x)).collect(),
            species: self.species.clone(),
            constraint: Arc::clone(&self.constraint),
        }
    }

    /// Returns a copy with new coordinates, validated against the existing species list.
    pub fn with_parameters(&self, parameters: Vec<f64>) -> Result<Self, StructureError> {
        Self::new(
            self.lattice.clone(),
            parameters,
            self.species.clone(),
            Arc::clone(&self.constraint),
        )
    }

    /// Returns a copy bound to a different constraint.
    pub fn with_constraint(&self, constraint: Arc<Constraint>) -> Self {
        Self {
            constraint,
            ..self.clone()
        }
    }

    pub fn species_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.species {
            *counts.entry(s.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Reduced-order chemical formula such as `Ag2Cu4`, species sorted alphabetically.
    pub fn formula(&self) -> String {
        self.species_counts()
            .into_iter()
            .map(|(s, n)| format!("{}{}", s, n))
            .collect()
    }
}
