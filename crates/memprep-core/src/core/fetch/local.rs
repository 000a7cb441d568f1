use super::{FetchError, FetchedStructure, parse_structure};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads structures named `<id>.pdb` from a directory.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    directory: PathBuf,
}

impl LocalFetcher {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Tries the identifier as given, then lower-cased.
    fn locate(&self, id: &str) -> Option<PathBuf> {
        [id.to_string(), id.to_ascii_lowercase()]
            .into_iter()
            .map(|name| self.directory.join(format!("{}.pdb", name)))
            .find(|path| path.is_file())
    }

    pub fn fetch(&self, id: &str) -> Result<FetchedStructure, FetchError> {
        let path = self.locate(id).ok_or_else(|| FetchError::UnknownIdentifier {
            id: id.to_string(),
            source_location: self.directory.display().to_string(),
        })?;
        debug!("Reading local structure {:?}", &path);
        let text = fs::read_to_string(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        parse_structure(id, &text, &path.display().to_string())
    }
}
