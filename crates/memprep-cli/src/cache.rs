use crate::error::{CliError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The on-disk cache of downloaded OPM entries.
#[derive(Debug)]
pub struct CacheManager {
    base_path: PathBuf,
}

impl CacheManager {
    pub fn new() -> Result<Self> {
        let path = Self::default_cache_path()?;
        debug!("CacheManager initialized with path: {:?}", &path);
        Ok(Self { base_path: path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { base_path: path }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Cached structure files currently on disk.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.is_file() && is_cache_file(&path) {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Removes every cached structure and returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        for path in &entries {
            fs::remove_file(path)?;
        }
        info!(
            "Removed {} cached file(s) from {:?}",
            entries.len(),
            &self.base_path
        );
        Ok(entries.len())
    }

    fn default_cache_path() -> Result<PathBuf> {
        ProjectDirs::from("edu", "caltech", "memprep")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .ok_or_else(|| CliError::Cache("Could not determine cache directory path.".to_string()))
    }
}

fn is_cache_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.ends_with(".pdb") || name.ends_with(".pdb.part")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clear_removes_only_structure_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1z98.pdb"), "ATOM").unwrap();
        fs::write(dir.path().join("2w2e.pdb.part"), "AT").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        let manager = CacheManager::with_path(dir.path().to_path_buf());

        assert_eq!(manager.entries().unwrap().len(), 2);
        assert_eq!(manager.clear().unwrap(), 2);

        assert!(manager.entries().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn missing_directory_is_an_empty_cache() {
        let dir = tempdir().unwrap();
        let manager = CacheManager::with_path(dir.path().join("never-created"));

        assert!(manager.entries().unwrap().is_empty());
        assert_eq!(manager.clear().unwrap(), 0);
    }
}
