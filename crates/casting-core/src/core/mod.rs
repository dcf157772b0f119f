//! # Core Module
//!
//! Data structures and stateless algorithms underneath the structure search.
//!
//! - **Structure representation** ([`models`]) - periodic lattices and atomic structures
//! - **Constraints** ([`constraints`]) - composition, distance and connectivity rules
//! - **Generation** ([`generation`]) - random constrained starting clusters
//! - **Perturbation** ([`perturbation`]) - bounded random displacement of coordinates
//! - **Energy** ([`forcefield`]) - pair potentials for the reference evaluator
//! - **File I/O** ([`io`]) - extended-XYZ reading and writing
//!
//! Nothing in this module owns search state; the optimizer in [`crate::engine`] composes these
//! pieces.

pub mod constraints;
pub mod forcefield;
pub mod generation;
pub mod io;
pub mod models;
pub mod perturbation;
pub(crate) mod utils;
