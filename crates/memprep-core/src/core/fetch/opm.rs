use super::{FetchError, FetchedStructure, parse_structure};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_OPM_BASE_URL: &str = "https://opm-assets.storage.googleapis.com/pdb";

#[derive(Debug, Clone, PartialEq)]
pub struct OpmOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// Read-through cache of downloaded entries; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl Default for OpmOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPM_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            cache_dir: None,
        }
    }
}

/// Downloads oriented structures from the OPM asset store.
///
/// Entries are requested as `{base_url}/{id}.pdb` with the identifier lower-cased.
/// When a cache directory is configured, a cached copy short-circuits the request
/// and a successful download is stored for later runs.
#[derive(Debug, Clone)]
pub struct OpmFetcher {
    client: Client,
    options: OpmOptions,
}

impl OpmFetcher {
    pub fn new(options: OpmOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("memprep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &OpmOptions {
        &self.options
    }

    pub fn url_for(&self, id: &str) -> String {
        format!(
            "{}/{}.pdb",
            self.options.base_url.trim_end_matches('/'),
            id.to_ascii_lowercase()
        )
    }

    fn cache_path(&self, id: &str) -> Option<PathBuf> {
        self.options
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.pdb", id.to_ascii_lowercase())))
    }

    pub fn fetch(&self, id: &str) -> Result<FetchedStructure, FetchError> {
        if let Some(path) = self.cache_path(id) {
            if path.is_file() {
                debug!("Using cached OPM entry {:?}", &path);
                let text = fs::read_to_string(&path).map_err(|source| FetchError::Io {
                    path: path.clone(),
                    source,
                })?;
                return parse_structure(id, &text, &path.display().to_string());
            }
        }

        let url = self.url_for(id);
        info!("Downloading {}", url);
        let text = self.download(id, &url)?;
        let fetched = parse_structure(id, &text, &url)?;

        if let Some(path) = self.cache_path(id) {
            if let Err(e) = store_in_cache(&path, &text) {
                warn!("Could not cache OPM entry at {:?}: {}", &path, e);
            }
        }
        Ok(fetched)
    }

    fn download(&self, id: &str, url: &str) -> Result<String, FetchError> {
        let unavailable = |reason: String| FetchError::SourceUnavailable {
            id: id.to_string(),
            reason,
        };

        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                unavailable(format!("request to {} timed out", url))
            } else if e.is_connect() {
                unavailable(format!("connection to {} failed: {}", url, e))
            } else {
                unavailable(format!("request to {} failed: {}", url, e))
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::UnknownIdentifier {
                id: id.to_string(),
                source_location: url.to_string(),
            }),
            status if !status.is_success() => {
                Err(unavailable(format!("{} returned HTTP {}", url, status)))
            }
            _ => response
                .text()
                .map_err(|e| unavailable(format!("failed to read body from {}: {}", url, e))),
        }
    }
}

// Each writer gets its own temp file beside the entry; the rename is atomic, so
// concurrent writers of one id never interleave and readers never see a partial entry.
fn store_in_cache(path: &Path, text: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("entry");
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{}.", stem))
        .suffix(".pdb.part")
        .tempfile_in(parent)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
