use super::worklist::CaseId;
use crate::core::io::report::ReportFormat;
use std::path::{Path, PathBuf};

/// Where a case's artifacts go inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    output_directory: PathBuf,
    report_format: ReportFormat,
}

/// The three target paths of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasePaths {
    /// `<id>.pdb`, the protein-only checkpoint.
    pub filtered: PathBuf,
    /// `<id>-prep.pdb`, the corrected structure.
    pub prepared: PathBuf,
    /// `<id>-data.xlsx` (or `.csv`), the per-residue report.
    pub report: PathBuf,
}

impl ArtifactLayout {
    pub fn new(output_directory: impl Into<PathBuf>, report_format: ReportFormat) -> Self {
        Self {
            output_directory: output_directory.into(),
            report_format,
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn paths_for(&self, case_id: &CaseId) -> CasePaths {
        let id = case_id.as_str();
        CasePaths {
            filtered: self.output_directory.join(format!("{}.pdb", id)),
            prepared: self.output_directory.join(format!("{}-prep.pdb", id)),
            report: self
                .output_directory
                .join(format!("{}-data.{}", id, self.report_format.extension())),
        }
    }
}

/// The artifacts actually produced for one case, filled in stage by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseArtifacts {
    pub filtered: Option<PathBuf>,
    pub prepared: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl CaseArtifacts {
    pub fn is_complete(&self) -> bool {
        self.filtered.is_some() && self.prepared.is_some() && self.report.is_some()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        [&self.filtered, &self.prepared, &self.report]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}
