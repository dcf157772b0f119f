use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "CASTING developers",
    version,
    about = "CASTING CLI - Monte Carlo tree search for low-energy atomic cluster and crystal structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used for parallel playouts.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for the lowest-energy structure satisfying the configured constraints.
    Search(SearchArgs),
    /// Generate random structures satisfying the configured constraints without scoring them.
    Generate(GenerateArgs),
    /// List the energy evaluators that can be named in a configuration file.
    Evaluators,
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the search configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Path for the best structure found (extended XYZ).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Start from the first frame of this XYZ file instead of a random structure.
    /// The frame must carry a `Lattice` entry.
    #[arg(long, value_name = "PATH")]
    pub initial: Option<PathBuf>,

    /// Override the random seed from the config file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of search iterations.
    #[arg(short = 'n', long, value_name = "INT")]
    pub niterations: Option<usize>,

    /// Override the evaluator name. Its parameters still come from the config file.
    #[arg(short, long, value_name = "NAME")]
    pub evaluator: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimizer.nexpand=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Path to the configuration file; only `lattice` and `constraint` are required.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Path for the generated structures (multi-frame extended XYZ).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Override the random seed from the config file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Number of structures to generate.
    #[arg(short = 'n', long, default_value_t = 1, value_name = "INT")]
    pub count: usize,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
