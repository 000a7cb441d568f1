use crate::config::FetchSource;
use clap::{Args, Parser, Subcommand};
use memprep::engine::config::HisStrategy;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "memprep CLI - Batch preparation of membrane protein structures from the OPM database: protein extraction, protonation-state assignment and per-residue reports.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, filter and prepare every structure of a worklist.
    Run(RunArgs),
    /// Prepare a single local PDB file.
    Prepare(PrepareArgs),
    /// Inspect or clear the download cache.
    Cache(CacheArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Cases to process: a worklist file, a comma-separated list of ids, or '@preset'
    /// (e.g., '@opm-failures').
    #[arg(short, long, required = true, value_name = "FILE|LIST|@PRESET")]
    pub worklist: String,

    /// Directory receiving the per-case artifacts. Created if missing.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub outdir: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep going after a failed case instead of stopping the batch.
    #[arg(long)]
    pub continue_on_error: bool,

    // --- Fetch Overrides ---
    /// Where structures come from.
    #[arg(long, value_enum, value_name = "SOURCE")]
    pub source: Option<FetchSource>,

    /// Directory holding '<id>.pdb' files for the 'local' source.
    #[arg(long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// Override the download cache directory.
    #[arg(long, value_name = "DIR", conflicts_with = "no_cache")]
    pub cache_dir: Option<PathBuf>,

    /// Always download, never read or write the cache.
    #[arg(long)]
    pub no_cache: bool,

    // --- Preparation Overrides ---
    /// Atom selection kept before preparation (e.g., 'protein and not hydrogen').
    #[arg(long, value_name = "EXPR")]
    pub selection: Option<String>,

    /// pH used to assign protonation states.
    #[arg(long, value_name = "FLOAT")]
    pub ph: Option<f64>,

    /// How neutral histidine tautomers are chosen (hid, hie, hb-network).
    #[arg(long, value_name = "STRATEGY")]
    pub his_strategy: Option<HisStrategy>,

    // --- Output Overrides ---
    /// Format of the per-residue report (xlsx or csv).
    #[arg(long, value_name = "FORMAT")]
    pub report_format: Option<String>,

    /// Number of cases processed in parallel.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S preparation.ph=6.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// Input PDB file (OPM header remarks are honored).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output structure; the extension selects PDB or mmCIF.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Where to write the per-residue report (.xlsx or .csv).
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Atom selection kept before preparation.
    #[arg(long, value_name = "EXPR")]
    pub selection: Option<String>,

    /// pH used to assign protonation states.
    #[arg(long, value_name = "FLOAT")]
    pub ph: Option<f64>,

    /// How neutral histidine tautomers are chosen (hid, hie, hb-network).
    #[arg(long, value_name = "STRATEGY")]
    pub his_strategy: Option<HisStrategy>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `cache` subcommand.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the absolute path to the download cache.
    Path,
    /// Delete every cached structure.
    Clear,
}
