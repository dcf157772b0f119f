//! Classical pair potentials used by the built-in reference evaluator.
//!
//! [`potentials`] holds the scalar functional forms and their radial derivatives; [`pair`] maps
//! species pairs onto them and sums energies and forces over a periodic structure.

pub mod pair;
pub mod potentials;
