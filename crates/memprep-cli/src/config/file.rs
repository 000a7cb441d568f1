use super::models::FetchSource;
use crate::error::{CliError, Result};
use memprep::engine::config::HisStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFetchConfig {
    pub source: Option<FetchSource>,
    pub base_url: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePreparationConfig {
    pub ph: Option<f64>,
    pub his_strategy: Option<HisStrategy>,
    pub flip_amides: Option<bool>,
    pub strip_hydrogens: Option<bool>,
    pub hbond_cutoff: Option<f64>,
    pub disulfide_cutoff: Option<f64>,
    pub verbose: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBatchConfig {
    pub selection: Option<String>,
    pub continue_on_error: Option<bool>,
    pub jobs: Option<usize>,
    pub report_format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub fetch: Option<FileFetchConfig>,
    pub preparation: Option<FilePreparationConfig>,
    pub batch: Option<FileBatchConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
