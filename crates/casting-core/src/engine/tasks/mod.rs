//! The per-iteration steps of the tree search.
//!
//! Selection and backpropagation are plain tree operations on [`SearchTree`](super::tree::SearchTree);
//! the steps here are the ones that generate or score structures.

pub mod expansion;
pub mod simulation;
