//! Retrieval of membrane-oriented structures and their orientation metadata.
//!
//! OPM distributes each entry as a PDB file already rotated into the membrane frame
//! (bilayer normal along z, center at z = 0). The half-thickness of the bilayer is
//! recorded in a `REMARK` header line, which [`OrientationMetadata`] extracts.

mod local;
mod opm;

pub use local::LocalFetcher;
pub use opm::{DEFAULT_OPM_BASE_URL, OpmFetcher, OpmOptions};

use crate::core::io::pdb::{PdbError, PdbFile, PdbMetadata};
use crate::core::io::traits::MolecularFile;
use crate::core::models::system::MolecularSystem;
use std::path::PathBuf;
use thiserror::Error;

const HALF_THICKNESS_MARKER: &str = "1/2 of bilayer thickness:";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unknown structure identifier '{id}' ({source_location})")]
    UnknownIdentifier { id: String, source_location: String },
    #[error("Structure source unavailable for '{id}': {reason}")]
    SourceUnavailable { id: String, reason: String },
    #[error("Failed to parse structure '{id}': {source}")]
    Parse {
        id: String,
        #[source]
        source: PdbError,
    },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to initialize HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Membrane placement information accompanying a fetched model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrientationMetadata {
    /// Half of the hydrophobic bilayer thickness in Angstroms, if the source reported it.
    pub membrane_half_thickness: Option<f64>,
    /// The raw `REMARK` lines of the source file.
    pub remarks: Vec<String>,
    /// Where the structure came from (URL or file path).
    pub source: String,
}

impl OrientationMetadata {
    pub fn from_header(metadata: &PdbMetadata, source: impl Into<String>) -> Self {
        let remarks: Vec<String> = metadata.remarks().map(str::to_string).collect();
        let membrane_half_thickness = remarks.iter().find_map(|line| parse_half_thickness(line));
        Self {
            membrane_half_thickness,
            remarks,
            source: source.into(),
        }
    }
}

fn parse_half_thickness(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once(HALF_THICKNESS_MARKER)?;
    rest.split_whitespace().next()?.parse().ok()
}

/// A retrieved atomic model paired with its orientation data.
#[derive(Debug, Clone)]
pub struct FetchedStructure {
    pub model: MolecularSystem,
    pub orientation: OrientationMetadata,
}

pub(crate) fn parse_structure(
    id: &str,
    text: &str,
    location: &str,
) -> Result<FetchedStructure, FetchError> {
    let (model, header) = PdbFile::read_from(&mut text.as_bytes()).map_err(|source| FetchError::Parse {
        id: id.to_string(),
        source,
    })?;
    Ok(FetchedStructure {
        model,
        orientation: OrientationMetadata::from_header(&header, location),
    })
}
