//! Reading and writing structures on disk and over pipes.
//!
//! Structures are exchanged as extended XYZ: an atom-count line, a comment line carrying the
//! cell as `Lattice="..."` plus optional `energy=...`, then one `species x y z` row per atom in
//! Cartesian Angstroms.

pub mod traits;
pub mod xyz;
