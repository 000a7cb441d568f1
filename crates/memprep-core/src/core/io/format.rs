use super::mmcif;
use super::pdb::{PdbError, PdbFile};
use super::traits::MolecularFile;
use crate::core::models::system::MolecularSystem;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Cannot infer a structure format from '{path}' (expected .pdb, .ent, .cif or .mmcif)")]
    UnsupportedFormat { path: PathBuf },
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("PDB serialization failed: {0}")]
    Pdb(#[from] PdbError),
}

/// Structure file formats the writer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Pdb,
    Mmcif,
}

impl StructureFormat {
    /// Infers the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdb" | "ent" => Some(Self::Pdb),
            "cif" | "mmcif" => Some(Self::Mmcif),
            _ => None,
        }
    }
}

/// Writes `system` to `path`, choosing the format from the file extension.
///
/// The target is truncated before writing, so a re-run replaces the previous
/// artifact. Nothing is created when the extension is not recognized.
pub fn write_structure(system: &MolecularSystem, path: &Path) -> Result<(), WriteError> {
    let format = StructureFormat::from_path(path).ok_or_else(|| WriteError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let io_error = |source: io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    match format {
        StructureFormat::Pdb => PdbFile::write_system_to(system, &mut writer)?,
        StructureFormat::Mmcif => {
            let block = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("structure");
            mmcif::write_system(system, block, &mut writer).map_err(io_error)?;
        }
    }
    writer.flush().map_err(io_error)
}
