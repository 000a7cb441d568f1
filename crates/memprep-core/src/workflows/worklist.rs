use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const OPM_FAILURES: &[&str] = &[
    "1z98", "2w2e", "2z73", "3cll", "3jbr", "3lut", "3rhw", "3spc", "3spg", "3syq", "4csk", "4hkr",
    "4kfm", "4pe5", "4tlm", "4uqj", "5an8",
];

/// Names accepted by [`Worklist::preset`].
pub const PRESET_NAMES: &[&str] = &["opm-failures"];

#[derive(Debug, Error)]
pub enum WorklistError {
    #[error("Invalid case identifier '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("Unknown worklist preset '{0}' (available: opm-failures)")]
    UnknownPreset(String),
    #[error("Failed to read worklist '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identifier of one case in a batch; also the stem of its artifact file names.
///
/// Valid identifiers are non-empty and contain neither whitespace nor path
/// separators, so every artifact stays inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Result<Self, WorklistError> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if id.chars().any(char::is_whitespace) {
            Some("must not contain whitespace")
        } else if id.contains(['/', '\\']) || id == "." || id == ".." {
            Some("must not contain path separators")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(WorklistError::InvalidId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CaseId {
    type Err = WorklistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for CaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered, immutable sequence of case identifiers. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worklist {
    ids: Vec<CaseId>,
}

impl Worklist {
    pub fn new(ids: Vec<CaseId>) -> Self {
        Self { ids }
    }

    /// Parses identifiers separated by commas and/or whitespace.
    pub fn parse_list(text: &str) -> Result<Self, WorklistError> {
        let ids = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(CaseId::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ids })
    }

    /// Reads a worklist file: identifiers separated by whitespace or commas, `#`
    /// starting a comment that runs to the end of the line.
    pub fn from_file(path: &Path) -> Result<Self, WorklistError> {
        let text = fs::read_to_string(path).map_err(|source| WorklistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stripped: Vec<&str> = text
            .lines()
            .map(|line| line.split_once('#').map_or(line, |(content, _)| content))
            .collect();
        Self::parse_list(&stripped.join("\n"))
    }

    pub fn preset(name: &str) -> Result<Self, WorklistError> {
        match name {
            "opm-failures" => Ok(Self {
                ids: OPM_FAILURES.iter().map(|id| CaseId(id.to_string())).collect(),
            }),
            other => Err(WorklistError::UnknownPreset(other.to_string())),
        }
    }

    /// Iterates from the first identifier; every call starts over.
    pub fn iter(&self) -> std::slice::Iter<'_, CaseId> {
        self.ids.iter()
    }

    pub fn ids(&self) -> &[CaseId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn has_duplicates(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.ids.len());
        !self.ids.iter().all(|id| seen.insert(id))
    }
}

impl<'a> IntoIterator for &'a Worklist {
    type Item = &'a CaseId;
    type IntoIter = std::slice::Iter<'a, CaseId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<CaseId> for Worklist {
    fn from_iter<T: IntoIterator<Item = CaseId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
