use memprep::engine::config::PreparationConfig;
use memprep::workflows::batch::BatchOptions;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FetchSource {
    /// Download from the OPM asset store.
    #[default]
    Opm,
    /// Read '<id>.pdb' files from a directory.
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub source: FetchSource,
    pub base_url: String,
    pub local_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub timeout: Duration,
}

pub struct RunConfig {
    pub fetch: FetchSettings,
    pub preparation: PreparationConfig,
    pub batch: BatchOptions,
}

pub struct PrepareConfig {
    pub preparation: PreparationConfig,
    pub selection: String,
}
