//! # Engine Module
//!
//! The Monte Carlo tree search that drives structure discovery.
//!
//! ## Overview
//!
//! Each iteration selects a node by an upper-confidence rule, expands it with perturbed
//! children that pass the constraint checker, runs a batch of randomized playouts through the
//! evaluator, and folds the best playout energy back up to the root.
//!
//! - **Configuration** ([`config`]) - search hyperparameters, lattice bounds and validation
//! - **Evaluators** ([`evaluators`]) - the energy boundary, its registry and built-in scorers
//! - **Search Tree** ([`tree`]) - node arena, selection scores and backpropagation
//! - **Progress Monitoring** ([`progress`]) - callback-based progress events
//! - **Error Handling** ([`error`]) - engine-level error aggregation
//!
//! Playouts run on the rayon pool when the `parallel` feature is enabled; every playout carries
//! its own seeded RNG so results do not depend on the thread count.

pub mod config;
pub mod context;
pub mod error;
pub mod evaluators;
pub mod progress;
pub(crate) mod tasks;
pub mod tree;
