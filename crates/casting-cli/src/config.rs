//! Layered configuration: built-in defaults, then the TOML file, then `-S KEY=VALUE`
//! overrides, then dedicated command-line flags.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_generate_config, build_search_config};
pub use models::{GenerateAppConfig, SearchAppConfig};
