//! # CASTING Core Library
//!
//! A tree-search optimizer for discovering low-energy atomic cluster structures that satisfy
//! composition and geometric constraints.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture that separates stateless domain models from
//! the stateful search machinery and from the user-facing entry points.
//!
//! - **[`core`]: The Foundation.** Periodic lattices, immutable `StructureData` values, the
//!   constraint checker, the random cluster generator, the perturbation operator, pair
//!   potentials and structure file I/O.
//!
//! - **[`engine`]: The Logic Core.** Configuration, the evaluator boundary and registry, the
//!   arena-backed `SearchTree` and the expansion and simulation tasks that drive it.
//!
//! - **[`workflows`]: The Public API.** Complete procedures such as [`workflows::search::run`],
//!   which generates a root structure and runs the Monte Carlo tree search to completion.

pub mod core;
pub mod engine;
pub mod workflows;
