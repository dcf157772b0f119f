//! # Core Models Module
//!
//! Fundamental value types describing periodic atomic structures.
//!
//! - [`lattice`] - Periodic cells, cell-parameter sampling bounds and minimum-image distances
//! - [`structure`] - Immutable `StructureData`: lattice, fractional coordinates and species
//!
//! ```ignore
//! use casting::core::models::{lattice::Lattice, structure::StructureData};
//!
//! let lattice = Lattice::cubic(12.0)?;
//! let structure = StructureData::new(lattice, vec![0.5, 0.5, 0.5], vec!["Cu".into()], constraint)?;
//! ```

pub mod lattice;
pub mod structure;
