//! # Workflows Module
//!
//! Top-level entry points that run a complete structure search from a validated configuration.
//!
//! - **Search Workflow** ([`search`]) - generate or accept a starting structure, evaluate it,
//!   run the tree search for the configured budget and report the best structure found.

pub mod search;
