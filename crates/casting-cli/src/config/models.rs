use casting::core::constraints::Constraint;
use casting::core::models::lattice::LatticeBounds;
use casting::engine::config::SearchConfig;
use std::path::PathBuf;

pub struct SearchAppConfig {
    pub output_path: PathBuf,
    pub initial_path: Option<PathBuf>,
    pub core_config: SearchConfig,
}

pub struct GenerateAppConfig {
    pub output_path: PathBuf,
    pub count: usize,
    pub seed: u64,
    pub lattice: LatticeBounds,
    pub constraint: Constraint,
}
