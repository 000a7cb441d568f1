//! Contracts for the stages a batch case passes through, with the default adapters.
//!
//! The batch driver only talks to these traits. All of them are `Send + Sync` so a
//! single [`Pipeline`] can be shared by the workers of a parallel batch.

use super::worklist::CaseId;
use crate::core::fetch::{
    FetchError, FetchedStructure, LocalFetcher, OpmFetcher, OrientationMetadata,
};
use crate::core::io::format::{WriteError, write_structure};
use crate::core::io::report::{ExportError, export_table};
use crate::core::models::system::MolecularSystem;
use crate::core::selection::{FilterError, select};
use crate::engine::config::PreparationConfig;
use crate::engine::error::PreparationError;
use crate::engine::progress::ProgressReporter;
use crate::engine::protonation;
use crate::engine::report::PreparationReport;
use std::path::Path;

pub trait StructureFetcher: Send + Sync {
    fn fetch(&self, case_id: &CaseId) -> Result<FetchedStructure, FetchError>;
}

pub trait AtomFilter: Send + Sync {
    fn filter(
        &self,
        model: MolecularSystem,
        selection: &str,
    ) -> Result<MolecularSystem, FilterError>;
}

pub trait StructureWriter: Send + Sync {
    fn write(&self, model: &MolecularSystem, path: &Path) -> Result<(), WriteError>;
}

pub trait ProtonationPreparer: Send + Sync {
    fn prepare(
        &self,
        model: MolecularSystem,
        orientation: &OrientationMetadata,
        reporter: &ProgressReporter,
    ) -> Result<(MolecularSystem, PreparationReport), PreparationError>;
}

pub trait ReportExporter: Send + Sync {
    fn export(&self, report: &PreparationReport, path: &Path) -> Result<(), ExportError>;
}

impl StructureFetcher for OpmFetcher {
    fn fetch(&self, case_id: &CaseId) -> Result<FetchedStructure, FetchError> {
        OpmFetcher::fetch(self, case_id.as_str())
    }
}

impl StructureFetcher for LocalFetcher {
    fn fetch(&self, case_id: &CaseId) -> Result<FetchedStructure, FetchError> {
        LocalFetcher::fetch(self, case_id.as_str())
    }
}

/// Filters with the selection language of [`crate::core::selection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionFilter;

impl AtomFilter for SelectionFilter {
    fn filter(
        &self,
        model: MolecularSystem,
        selection: &str,
    ) -> Result<MolecularSystem, FilterError> {
        select(model, selection)
    }
}

/// Writes PDB or mmCIF depending on the target extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStructureWriter;

impl StructureWriter for FileStructureWriter {
    fn write(&self, model: &MolecularSystem, path: &Path) -> Result<(), WriteError> {
        write_structure(model, path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedPreparer {
    config: PreparationConfig,
}

impl RuleBasedPreparer {
    pub fn new(config: PreparationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }
}

impl ProtonationPreparer for RuleBasedPreparer {
    fn prepare(
        &self,
        model: MolecularSystem,
        orientation: &OrientationMetadata,
        reporter: &ProgressReporter,
    ) -> Result<(MolecularSystem, PreparationReport), PreparationError> {
        protonation::prepare(model, orientation, &self.config, reporter)
    }
}

/// Exports reports as `.xlsx` or `.csv` depending on the target extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetExporter;

impl ReportExporter for SpreadsheetExporter {
    fn export(&self, report: &PreparationReport, path: &Path) -> Result<(), ExportError> {
        export_table(report, path)
    }
}

/// The full set of collaborators a batch runs with.
pub struct Pipeline {
    pub(crate) fetcher: Box<dyn StructureFetcher>,
    pub(crate) filter: Box<dyn AtomFilter>,
    pub(crate) writer: Box<dyn StructureWriter>,
    pub(crate) preparer: Box<dyn ProtonationPreparer>,
    pub(crate) exporter: Box<dyn ReportExporter>,
}

impl Pipeline {
    /// Uses `fetcher` with the default filter, writer, preparer and exporter.
    pub fn new(fetcher: impl StructureFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            filter: Box::new(SelectionFilter),
            writer: Box::new(FileStructureWriter),
            preparer: Box::new(RuleBasedPreparer::default()),
            exporter: Box::new(SpreadsheetExporter),
        }
    }

    pub fn with_filter(mut self, filter: impl AtomFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_writer(mut self, writer: impl StructureWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn with_preparer(mut self, preparer: impl ProtonationPreparer + 'static) -> Self {
        self.preparer = Box::new(preparer);
        self
    }

    pub fn with_exporter(mut self, exporter: impl ReportExporter + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }
}
