use super::artifacts::{ArtifactLayout, CaseArtifacts, CasePaths};
use super::cancel::CancellationToken;
use super::collaborators::Pipeline;
use super::worklist::{CaseId, Worklist};
use crate::core::fetch::{FetchError, FetchedStructure};
use crate::core::io::format::WriteError;
use crate::core::io::report::{ExportError, ReportFormat};
use crate::core::selection::FilterError;
use crate::engine::error::PreparationError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{error, info, info_span, instrument, warn};

/// What happens to the rest of the batch after a case fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure; later cases are not attempted.
    #[default]
    Abort,
    /// Record the failure and move on to the next case.
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub policy: FailurePolicy,
    /// Selection expression applied after fetching.
    pub selection: String,
    /// Worker count; `1` runs sequentially.
    pub jobs: usize,
    /// Upper bound on fetches in flight at once.
    pub max_concurrent_fetches: usize,
    pub report_format: ReportFormat,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Abort,
            selection: "protein".to_string(),
            jobs: 1,
            max_concurrent_fetches: 1,
            report_format: ReportFormat::Xlsx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Filter,
    Checkpoint,
    Prepare,
    WritePrepared,
    Export,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Filter => "filter",
            Stage::Checkpoint => "checkpoint",
            Stage::Prepare => "prepare",
            Stage::WritePrepared => "write-prepared",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Furthest point a case reached. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaseState {
    Pending,
    Fetched,
    Filtered,
    Checkpointed,
    Prepared,
    Exported,
}

#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Preparation(#[from] PreparationError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct CaseFailure {
    pub stage: Stage,
    #[source]
    pub error: CaseError,
}

impl CaseFailure {
    pub fn new(stage: Stage, error: impl Into<CaseError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

#[derive(Debug)]
pub struct CaseOutcome {
    pub case_id: CaseId,
    /// Position in the worklist.
    pub index: usize,
    pub state: CaseState,
    pub failure: Option<CaseFailure>,
    pub artifacts: CaseArtifacts,
}

impl CaseOutcome {
    fn pending(case_id: CaseId, index: usize) -> Self {
        Self {
            case_id,
            index,
            state: CaseState::Pending,
            failure: None,
            artifacts: CaseArtifacts::default(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.state == CaseState::Exported
    }
}

#[derive(Debug, Default)]
pub struct BatchResult {
    /// One entry per attempted case, in worklist order.
    pub outcomes: Vec<CaseOutcome>,
    /// Cases never started, in worklist order.
    pub not_attempted: Vec<CaseId>,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.not_attempted.is_empty() && self.outcomes.iter().all(CaseOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&CaseId, &CaseFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure.as_ref().map(|f| (&o.case_id, f)))
    }

    pub fn first_failure(&self) -> Option<(&CaseId, &CaseFailure)> {
        self.failures().next()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &CaseId> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(|o| &o.case_id)
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared state of one `run` call.
struct RunContext<'a, 'r> {
    layout: ArtifactLayout,
    /// Every fetch runs on this pool, so its size caps concurrent retrievals.
    fetch_pool: rayon::ThreadPool,
    reporter: &'a ProgressReporter<'r>,
}

/// Drives every case of a worklist through the pipeline.
pub struct BatchRunner {
    pipeline: Pipeline,
    options: BatchOptions,
    cancellation: CancellationToken,
}

impl BatchRunner {
    pub fn new(pipeline: Pipeline, options: BatchOptions) -> Self {
        Self {
            pipeline,
            options,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn run(&self, worklist: &Worklist, output_directory: &Path) -> Result<BatchResult, BatchError> {
        self.run_with_progress(worklist, output_directory, &ProgressReporter::new())
    }

    /// Runs the batch, streaming [`Progress`] events to `reporter`.
    ///
    /// # Errors
    ///
    /// Only setup problems are errors; per-case failures are recorded in the
    /// returned [`BatchResult`].
    #[instrument(skip_all, name = "batch", fields(cases = worklist.len()))]
    pub fn run_with_progress(
        &self,
        worklist: &Worklist,
        output_directory: &Path,
        reporter: &ProgressReporter,
    ) -> Result<BatchResult, BatchError> {
        fs::create_dir_all(output_directory).map_err(|source| BatchError::OutputDirectory {
            path: output_directory.to_path_buf(),
            source,
        })?;

        let fetch_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.max_concurrent_fetches.max(1))
            .thread_name(|i| format!("memprep-fetch-{}", i))
            .build()?;
        let context = RunContext {
            layout: ArtifactLayout::new(output_directory, self.options.report_format),
            fetch_pool,
            reporter,
        };

        reporter.report(Progress::BatchStart {
            total_cases: worklist.len() as u64,
        });
        info!(
            "Starting batch of {} case(s) into {:?} ({:?} policy)",
            worklist.len(),
            output_directory,
            self.options.policy
        );

        let parallel = self.options.jobs > 1 && worklist.len() > 1;
        let result = if parallel && worklist.has_duplicates() {
            warn!("Worklist contains duplicate identifiers; running sequentially.");
            self.run_sequential(worklist, &context)
        } else if parallel {
            self.run_parallel(worklist, &context)?
        } else {
            self.run_sequential(worklist, &context)
        };

        reporter.report(Progress::BatchFinish);
        info!(
            "Batch finished: {} succeeded, {} failed, {} not attempted{}",
            result.succeeded().count(),
            result.failures().count(),
            result.not_attempted.len(),
            if result.cancelled { " (cancelled)" } else { "" }
        );
        Ok(result)
    }

    fn run_sequential(&self, worklist: &Worklist, context: &RunContext<'_, '_>) -> BatchResult {
        let mut result = BatchResult::default();
        let ids = worklist.ids();

        for (index, case_id) in ids.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!("Batch cancelled before case '{}'", case_id);
                result.cancelled = true;
                result.not_attempted.extend(ids[index..].iter().cloned());
                break;
            }

            let outcome = self.run_case(index, case_id, context);
            let failed = outcome.failure.is_some();
            result.outcomes.push(outcome);

            if failed && self.options.policy == FailurePolicy::Abort {
                result.not_attempted.extend(ids[index + 1..].iter().cloned());
                break;
            }
        }
        result
    }

    /// Runs one claiming loop per worker thread. Cases are claimed in worklist order,
    /// so after an abort or cancellation the unclaimed ids form the tail of the list.
    fn run_parallel(&self, worklist: &Worklist, context: &RunContext<'_, '_>) -> Result<BatchResult, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .thread_name(|i| format!("memprep-case-{}", i))
            .build()?;
        let ids = worklist.ids();
        let next = AtomicUsize::new(0);
        let halted = AtomicBool::new(false);
        let saw_cancel = AtomicBool::new(false);

        let per_worker: Vec<Vec<CaseOutcome>> = pool.broadcast(|_| {
            let mut finished = Vec::new();
            while !halted.load(Ordering::SeqCst) {
                if self.cancellation.is_cancelled() {
                    saw_cancel.store(true, Ordering::SeqCst);
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(case_id) = ids.get(index) else {
                    break;
                };
                let outcome = self.run_case(index, case_id, context);
                if outcome.failure.is_some() && self.options.policy == FailurePolicy::Abort {
                    halted.store(true, Ordering::SeqCst);
                }
                finished.push(outcome);
            }
            finished
        });

        let mut slots: Vec<Option<CaseOutcome>> = ids.iter().map(|_| None).collect();
        for outcome in per_worker.into_iter().flatten() {
            let index = outcome.index;
            slots[index] = Some(outcome);
        }

        let mut result = BatchResult {
            cancelled: saw_cancel.load(Ordering::SeqCst),
            ..Default::default()
        };
        for (slot, case_id) in slots.into_iter().zip(ids) {
            match slot {
                Some(outcome) => result.outcomes.push(outcome),
                None => result.not_attempted.push(case_id.clone()),
            }
        }
        Ok(result)
    }

    fn run_case(&self, index: usize, case_id: &CaseId, context: &RunContext<'_, '_>) -> CaseOutcome {
        let span = info_span!("case", id = %case_id);
        let _guard = span.enter();

        context.reporter.report(Progress::CaseStart {
            case_id: case_id.to_string(),
            index,
        });
        info!("Working on case '{}'", case_id);

        let paths = context.layout.paths_for(case_id);
        let mut outcome = CaseOutcome::pending(case_id.clone(), index);
        if let Err(failure) = self.execute(case_id, &paths, &mut outcome, context) {
            error!("Case '{}' failed: {}", case_id, failure);
            outcome.failure = Some(failure);
        }

        context.reporter.report(Progress::CaseFinish {
            case_id: case_id.to_string(),
            succeeded: outcome.succeeded(),
        });
        outcome
    }

    fn execute(
        &self,
        case_id: &CaseId,
        paths: &CasePaths,
        outcome: &mut CaseOutcome,
        context: &RunContext<'_, '_>,
    ) -> Result<(), CaseFailure> {
        let pipeline = &self.pipeline;
        let stage = |stage: Stage| {
            context.reporter.report(Progress::StageStart {
                case_id: case_id.to_string(),
                stage: stage.name(),
            });
        };

        stage(Stage::Fetch);
        let FetchedStructure { model, orientation } = context
            .fetch_pool
            .install(|| pipeline.fetcher.fetch(case_id))
            .map_err(|e| CaseFailure::new(Stage::Fetch, e))?;
        outcome.state = CaseState::Fetched;

        stage(Stage::Filter);
        let filtered = pipeline
            .filter
            .filter(model, &self.options.selection)
            .map_err(|e| CaseFailure::new(Stage::Filter, e))?;
        outcome.state = CaseState::Filtered;

        stage(Stage::Checkpoint);
        pipeline
            .writer
            .write(&filtered, &paths.filtered)
            .map_err(|e| CaseFailure::new(Stage::Checkpoint, e))?;
        outcome.artifacts.filtered = Some(paths.filtered.clone());
        outcome.state = CaseState::Checkpointed;

        stage(Stage::Prepare);
        let (prepared, report) = pipeline
            .preparer
            .prepare(filtered, &orientation, context.reporter)
            .map_err(|e| CaseFailure::new(Stage::Prepare, e))?;
        outcome.state = CaseState::Prepared;

        stage(Stage::WritePrepared);
        pipeline
            .writer
            .write(&prepared, &paths.prepared)
            .map_err(|e| CaseFailure::new(Stage::WritePrepared, e))?;
        outcome.artifacts.prepared = Some(paths.prepared.clone());

        stage(Stage::Export);
        pipeline
            .exporter
            .export(&report, &paths.report)
            .map_err(|e| CaseFailure::new(Stage::Export, e))?;
        outcome.artifacts.report = Some(paths.report.clone());
        outcome.state = CaseState::Exported;

        info!("Case '{}' complete ({} residues)", case_id, report.summary().residues);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fetch::parse_structure;
    use crate::workflows::collaborators::StructureFetcher;
    use calamine::{Reader, Xlsx, open_workbook};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const MEMBRANE_PROTEIN: &str = "\
REMARK      1/2 of bilayer thickness:   15.4
ATOM      1  N   ALA A   1      11.104   6.134 -13.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071 -12.142  1.00  0.00           C
ATOM      3  C   ALA A   1      13.159   6.195 -12.104  1.00  0.00           C
ATOM      4  O   ALA A   1      13.763   6.886 -12.920  1.00  0.00           O
ATOM      5  CB  ALA A   1      11.087   7.213 -11.300  1.00  0.00           C
ATOM      6  N   GLY A   2      13.778   5.520 -11.140  1.00  0.00           N
ATOM      7  CA  GLY A   2      15.225   5.543 -11.006  1.00  0.00           C
ATOM      8  C   GLY A   2      15.704   6.264  -9.755  1.00  0.00           C
ATOM      9  O   GLY A   2      15.012   6.422  -8.748  1.00  0.00           O
HETATM   10  O   HOH W 101      20.000  20.000  20.000  1.00  0.00           O
HETATM   11  O   DUM X 900       0.000   0.000  15.400  1.00  0.00           O
END
";

    const WATER_ONLY: &str = "\
HETATM    1  O   HOH W   1       0.000   0.000   0.000  1.00  0.00           O
END
";

    const MISSING_CA: &str = "\
ATOM      1  N   ALA A   1      11.104   6.134 -13.504  1.00  0.00           N
ATOM      2  CB  ALA A   1      11.087   7.213 -11.300  1.00  0.00           C
END
";

    #[derive(Default)]
    struct FakeState {
        structures: HashMap<String, &'static str>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        cancel_on: Option<(String, CancellationToken)>,
        delay: Duration,
    }

    #[derive(Clone, Default)]
    struct FakeFetcher {
        state: Arc<FakeState>,
    }

    impl FakeFetcher {
        fn with(entries: &[(&str, &'static str)]) -> Self {
            Self::build(entries, None, Duration::ZERO)
        }

        fn build(
            entries: &[(&str, &'static str)],
            cancel_on: Option<(String, CancellationToken)>,
            delay: Duration,
        ) -> Self {
            let structures = entries
                .iter()
                .map(|(id, text)| (id.to_string(), *text))
                .collect();
            Self {
                state: Arc::new(FakeState {
                    structures,
                    cancel_on,
                    delay,
                    ..Default::default()
                }),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.state.calls.lock().unwrap().clone()
        }
    }

    impl StructureFetcher for FakeFetcher {
        fn fetch(&self, case_id: &CaseId) -> Result<FetchedStructure, FetchError> {
            let state = &self.state;
            state.calls.lock().unwrap().push(case_id.to_string());
            let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            state.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(state.delay);
            state.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some((id, token)) = &state.cancel_on {
                if id == case_id.as_str() {
                    token.cancel();
                }
            }
            match state.structures.get(case_id.as_str()) {
                Some(text) => parse_structure(case_id.as_str(), text, "fake"),
                None => Err(FetchError::UnknownIdentifier {
                    id: case_id.to_string(),
                    source_location: "fake".to_string(),
                }),
            }
        }
    }

    fn worklist(ids: &str) -> Worklist {
        Worklist::parse_list(ids).unwrap()
    }

    fn runner(fetcher: &FakeFetcher, options: BatchOptions) -> BatchRunner {
        BatchRunner::new(Pipeline::new(fetcher.clone()), options)
    }

    fn non_empty(path: &Path) -> bool {
        fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
    }

    #[test]
    fn successful_case_produces_three_non_empty_artifacts() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);

        let result = runner(&fetcher, BatchOptions::default())
            .run(&worklist("1z98"), dir.path())
            .unwrap();

        assert!(result.is_success());
        let outcome = &result.outcomes[0];
        assert_eq!(outcome.state, CaseState::Exported);
        assert!(outcome.artifacts.is_complete());
        for name in ["1z98.pdb", "1z98-prep.pdb", "1z98-data.xlsx"] {
            assert!(non_empty(&dir.path().join(name)), "{} missing or empty", name);
        }
        let checkpoint = fs::read_to_string(dir.path().join("1z98.pdb")).unwrap();
        assert!(!checkpoint.contains("HOH"));
        assert!(!checkpoint.contains("DUM"));
    }

    #[test]
    fn rerun_overwrites_with_identical_structure_files() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);
        let batch = runner(&fetcher, BatchOptions::default());

        batch.run(&worklist("1z98"), dir.path()).unwrap();
        let first_filtered = fs::read(dir.path().join("1z98.pdb")).unwrap();
        let first_prepared = fs::read(dir.path().join("1z98-prep.pdb")).unwrap();

        let result = batch.run(&worklist("1z98"), dir.path()).unwrap();

        assert!(result.is_success());
        assert_eq!(fs::read(dir.path().join("1z98.pdb")).unwrap(), first_filtered);
        assert_eq!(fs::read(dir.path().join("1z98-prep.pdb")).unwrap(), first_prepared);
    }

    #[test]
    fn empty_selection_fails_in_filter_stage_without_writing() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("wat", WATER_ONLY)]);

        let result = runner(&fetcher, BatchOptions::default())
            .run(&worklist("wat"), dir.path())
            .unwrap();

        let outcome = &result.outcomes[0];
        assert_eq!(outcome.state, CaseState::Fetched);
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Filter);
        assert!(matches!(
            failure.error,
            CaseError::Filter(FilterError::EmptySelection { .. })
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn preparation_failure_keeps_only_the_checkpoint() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("noca", MISSING_CA)]);

        let result = runner(&fetcher, BatchOptions::default())
            .run(&worklist("noca"), dir.path())
            .unwrap();

        let outcome = &result.outcomes[0];
        assert_eq!(outcome.state, CaseState::Checkpointed);
        assert_eq!(outcome.failure.as_ref().unwrap().stage, Stage::Prepare);
        assert!(dir.path().join("noca.pdb").exists());
        assert!(!dir.path().join("noca-prep.pdb").exists());
        assert!(!dir.path().join("noca-data.xlsx").exists());
    }

    #[test]
    fn cases_run_and_report_in_worklist_order() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[
            ("c", MEMBRANE_PROTEIN),
            ("a", MEMBRANE_PROTEIN),
            ("b", MEMBRANE_PROTEIN),
        ]);
        let starts = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::CaseStart { case_id, index } = event {
                starts.lock().unwrap().push((case_id, index));
            }
        }));

        let result = runner(&fetcher, BatchOptions::default())
            .run_with_progress(&worklist("c a b"), dir.path(), &reporter)
            .unwrap();
        drop(reporter);

        assert_eq!(fetcher.calls(), vec!["c", "a", "b"]);
        assert_eq!(
            starts.into_inner().unwrap(),
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
        let order: Vec<&str> = result.outcomes.iter().map(|o| o.case_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn stage_events_follow_pipeline_order() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);
        let stages = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::StageStart { stage, .. } = event {
                stages.lock().unwrap().push(stage);
            }
        }));

        runner(&fetcher, BatchOptions::default())
            .run_with_progress(&worklist("1z98"), dir.path(), &reporter)
            .unwrap();
        drop(reporter);

        assert_eq!(
            stages.into_inner().unwrap(),
            vec![
                "fetch",
                "filter",
                "checkpoint",
                "prepare",
                "write-prepared",
                "export"
            ]
        );
    }

    #[test]
    fn abort_policy_halts_at_first_failure() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[
            ("1z98", MEMBRANE_PROTEIN),
            ("2w2e", MEMBRANE_PROTEIN),
        ]);

        let result = runner(&fetcher, BatchOptions::default())
            .run(&worklist("1z98,BAD_ID,2w2e"), dir.path())
            .unwrap();

        assert!(!result.is_success());
        assert!(!result.cancelled);
        assert_eq!(result.outcomes.len(), 2);
        assert!(result.outcomes[0].succeeded());
        assert!(result.outcomes[0].artifacts.is_complete());

        let (id, failure) = result.first_failure().unwrap();
        assert_eq!(id.as_str(), "BAD_ID");
        assert_eq!(failure.stage, Stage::Fetch);
        assert!(matches!(
            failure.error,
            CaseError::Fetch(FetchError::UnknownIdentifier { .. })
        ));

        assert_eq!(result.not_attempted, vec![CaseId::new("2w2e").unwrap()]);
        assert_eq!(fetcher.calls(), vec!["1z98", "BAD_ID"]);
        assert!(!dir.path().join("2w2e.pdb").exists());
        assert!(!dir.path().join("BAD_ID.pdb").exists());
    }

    #[test]
    fn continue_policy_records_failures_and_finishes_the_rest() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[
            ("1z98", MEMBRANE_PROTEIN),
            ("wat", WATER_ONLY),
            ("2w2e", MEMBRANE_PROTEIN),
        ]);
        let options = BatchOptions {
            policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let result = runner(&fetcher, options)
            .run(&worklist("1z98 BAD_ID wat 2w2e"), dir.path())
            .unwrap();

        assert_eq!(result.outcomes.len(), 4);
        assert!(result.not_attempted.is_empty());
        let failed: Vec<(&str, Stage)> = result
            .failures()
            .map(|(id, f)| (id.as_str(), f.stage))
            .collect();
        assert_eq!(failed, vec![("BAD_ID", Stage::Fetch), ("wat", Stage::Filter)]);
        let succeeded: Vec<&str> = result.succeeded().map(CaseId::as_str).collect();
        assert_eq!(succeeded, vec!["1z98", "2w2e"]);
        assert!(dir.path().join("2w2e-data.xlsx").exists());
    }

    #[test]
    fn workbook_has_one_row_per_residue_plus_header() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);

        runner(&fetcher, BatchOptions::default())
            .run(&worklist("1z98"), dir.path())
            .unwrap();

        let mut workbook: Xlsx<_> = open_workbook(dir.path().join("1z98-data.xlsx")).unwrap();
        let range = workbook.worksheet_range("Report").unwrap();
        assert_eq!(range.height(), 3);
    }

    #[test]
    fn csv_report_format_changes_the_report_extension() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);
        let options = BatchOptions {
            report_format: ReportFormat::Csv,
            ..Default::default()
        };

        runner(&fetcher, options)
            .run(&worklist("1z98"), dir.path())
            .unwrap();

        let csv = fs::read_to_string(dir.path().join("1z98-data.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn cancellation_before_start_attempts_nothing() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);
        let batch = runner(&fetcher, BatchOptions::default());
        batch.cancellation_token().cancel();

        let result = batch.run(&worklist("1z98 2w2e"), dir.path()).unwrap();

        assert!(result.cancelled);
        assert!(result.outcomes.is_empty());
        assert_eq!(result.not_attempted.len(), 2);
        assert!(fetcher.calls().is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn cancellation_mid_run_lets_the_current_case_finish() {
        let dir = tempdir().unwrap();
        let token = CancellationToken::new();
        let fetcher = FakeFetcher::build(
            &[("a", MEMBRANE_PROTEIN), ("b", MEMBRANE_PROTEIN)],
            Some(("a".to_string(), token.clone())),
            Duration::ZERO,
        );
        let batch = runner(&fetcher, BatchOptions::default()).with_cancellation(token);

        let result = batch.run(&worklist("a b"), dir.path()).unwrap();

        assert!(result.cancelled);
        assert_eq!(result.outcomes.len(), 1);
        assert!(result.outcomes[0].succeeded());
        assert_eq!(result.not_attempted, vec![CaseId::new("b").unwrap()]);
    }

    #[test]
    fn parallel_run_preserves_result_order() {
        let dir = tempdir().unwrap();
        let ids = ["p1", "p2", "p3", "p4", "p5", "p6"];
        let entries: Vec<(&str, &'static str)> =
            ids.iter().map(|id| (*id, MEMBRANE_PROTEIN)).collect();
        let fetcher = FakeFetcher::build(&entries, None, Duration::from_millis(10));
        let options = BatchOptions {
            jobs: 3,
            max_concurrent_fetches: 3,
            ..Default::default()
        };

        let result = runner(&fetcher, options)
            .run(&worklist(&ids.join(" ")), dir.path())
            .unwrap();

        assert!(result.is_success());
        let order: Vec<&str> = result.outcomes.iter().map(|o| o.case_id.as_str()).collect();
        assert_eq!(order, ids);
        let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn fetch_pool_bounds_concurrent_fetches() {
        let dir = tempdir().unwrap();
        let ids = ["g1", "g2", "g3", "g4"];
        let entries: Vec<(&str, &'static str)> =
            ids.iter().map(|id| (*id, MEMBRANE_PROTEIN)).collect();
        let fetcher = FakeFetcher::build(&entries, None, Duration::from_millis(20));
        let options = BatchOptions {
            jobs: 4,
            max_concurrent_fetches: 1,
            ..Default::default()
        };

        let result = runner(&fetcher, options)
            .run(&worklist(&ids.join(" ")), dir.path())
            .unwrap();

        assert!(result.is_success());
        assert_eq!(fetcher.state.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parallel_abort_stops_claiming_new_cases() {
        let dir = tempdir().unwrap();
        let ids: Vec<String> = std::iter::once("BAD_ID".to_string())
            .chain((1..=11).map(|i| format!("q{}", i)))
            .collect();
        let entries: Vec<(&str, &'static str)> = ids[1..]
            .iter()
            .map(|id| (id.as_str(), MEMBRANE_PROTEIN))
            .collect();
        let fetcher = FakeFetcher::build(&entries, None, Duration::from_millis(20));
        let options = BatchOptions {
            jobs: 2,
            ..Default::default()
        };

        let result = runner(&fetcher, options)
            .run(&worklist(&ids.join(" ")), dir.path())
            .unwrap();

        assert!(!result.is_success());
        assert!(!result.cancelled);
        let (failed_id, failure) = result.first_failure().unwrap();
        assert_eq!(failed_id.as_str(), "BAD_ID");
        assert_eq!(failure.stage, Stage::Fetch);

        assert!(!result.not_attempted.is_empty());
        assert_eq!(result.outcomes.len() + result.not_attempted.len(), ids.len());
        let calls = fetcher.calls();
        for skipped in &result.not_attempted {
            assert!(!calls.contains(&skipped.to_string()));
            assert!(!dir.path().join(format!("{}.pdb", skipped)).exists());
            assert!(!dir.path().join(format!("{}-prep.pdb", skipped)).exists());
        }
    }

    #[test]
    fn parallel_run_honors_cancellation() {
        let dir = tempdir().unwrap();
        let ids: Vec<String> = (1..=12).map(|i| format!("c{}", i)).collect();
        let entries: Vec<(&str, &'static str)> =
            ids.iter().map(|id| (id.as_str(), MEMBRANE_PROTEIN)).collect();
        let token = CancellationToken::new();
        let fetcher = FakeFetcher::build(
            &entries,
            Some(("c2".to_string(), token.clone())),
            Duration::from_millis(20),
        );
        let options = BatchOptions {
            jobs: 2,
            ..Default::default()
        };
        let batch = runner(&fetcher, options).with_cancellation(token);

        let result = batch.run(&worklist(&ids.join(" ")), dir.path()).unwrap();

        assert!(result.cancelled);
        assert!(!result.not_attempted.is_empty());
        assert_eq!(result.outcomes.len() + result.not_attempted.len(), ids.len());
        assert!(result.outcomes.iter().all(CaseOutcome::succeeded));
        let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
        assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn duplicate_ids_fall_back_to_sequential() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN), ("2w2e", MEMBRANE_PROTEIN)]);
        let options = BatchOptions {
            jobs: 4,
            ..Default::default()
        };

        let result = runner(&fetcher, options)
            .run(&worklist("1z98 2w2e 1z98"), dir.path())
            .unwrap();

        assert!(result.is_success());
        assert_eq!(fetcher.calls(), vec!["1z98", "2w2e", "1z98"]);
    }

    #[test]
    fn output_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("runs").join("today");
        let fetcher = FakeFetcher::with(&[("1z98", MEMBRANE_PROTEIN)]);

        let result = runner(&fetcher, BatchOptions::default())
            .run(&worklist("1z98"), &nested)
            .unwrap();

        assert!(result.is_success());
        assert!(nested.join("1z98-prep.pdb").exists());
    }

    #[test]
    fn output_directory_that_is_a_file_is_a_setup_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("taken");
        fs::write(&blocker, "not a directory").unwrap();
        let fetcher = FakeFetcher::with(&[]);

        let err = runner(&fetcher, BatchOptions::default())
            .run(&worklist("1z98"), &blocker)
            .unwrap_err();

        assert!(matches!(err, BatchError::OutputDirectory { .. }));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn failure_display_names_the_stage() {
        let failure = CaseFailure::new(Stage::Filter, FilterError::EmptySelection {
            expression: "protein".to_string(),
        });
        assert!(failure.to_string().starts_with("filter stage failed:"));
    }
}
