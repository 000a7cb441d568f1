use crate::cache::CacheManager;
use crate::cli::RunArgs;
use crate::config::{self, FetchSettings, FetchSource};
use crate::error::{CliError, INTERRUPTED_EXIT_CODE, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use crate::utils::parser;
use memprep::core::fetch::{FetchError, LocalFetcher, OpmFetcher, OpmOptions};
use memprep::engine::config::PreparationConfig;
use memprep::engine::progress::ProgressReporter;
use memprep::workflows::batch::{BatchResult, BatchRunner};
use memprep::workflows::cancel::CancellationToken;
use memprep::workflows::collaborators::{Pipeline, RuleBasedPreparer};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info, warn};

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let cache = CacheManager::new()?;
    info!("Merging configuration from file and CLI arguments...");
    let config = config::build_run_config(&args, &cache)?;

    let worklist = parser::parse_worklist_spec(&args.worklist)
        .map_err(|e| CliError::Argument(e.to_string()))?
        .load()
        .map_err(|e| CliError::Argument(e.to_string()))?;
    if worklist.is_empty() {
        return Err(CliError::Argument(format!(
            "Worklist '{}' contains no identifiers",
            args.worklist
        )));
    }
    info!(
        "Loaded {} case(s); writing artifacts to {:?}",
        worklist.len(),
        &args.outdir
    );

    let token = CancellationToken::new();
    let interrupt = task::spawn(handle_interrupts(
        token.clone(),
        tokio::signal::ctrl_c,
        || std::process::exit(INTERRUPTED_EXIT_CODE),
    ));

    let handler = CliProgressHandler::new(ui_sender);
    let outdir = args.outdir.clone();
    let batch = task::spawn_blocking(move || -> Result<BatchResult> {
        let pipeline = build_pipeline(&config.fetch, config.preparation)
            .map_err(|e| CliError::Other(e.into()))?;
        let runner = BatchRunner::new(pipeline, config.batch).with_cancellation(token);
        let reporter = ProgressReporter::with_callback(handler.get_callback());
        Ok(runner.run_with_progress(&worklist, &outdir, &reporter)?)
    })
    .await;
    interrupt.abort();

    let result = batch
        .map_err(|e| CliError::Other(anyhow::anyhow!("Batch task failed: {}", e)))??;
    summarize(&result)
}

/// The first interrupt cancels the batch so cases in progress can finish; a second
/// one calls `force_exit` without waiting for them.
async fn handle_interrupts<S, F>(token: CancellationToken, mut signal: S, force_exit: impl FnOnce())
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return;
    }
    warn!("Interrupt received; stopping after the cases in progress (press Ctrl-C again to exit now).");
    token.cancel();

    if signal().await.is_ok() {
        error!("Second interrupt received; exiting without waiting for cases in progress.");
        force_exit();
    }
}

/// Wires the configured structure source into a pipeline.
///
/// Must run outside the async runtime: the OPM client is blocking.
fn build_pipeline(
    fetch: &FetchSettings,
    preparation: PreparationConfig,
) -> std::result::Result<Pipeline, FetchError> {
    let pipeline = match fetch.source {
        FetchSource::Opm => {
            info!("Fetching structures from {}", fetch.base_url);
            Pipeline::new(OpmFetcher::new(OpmOptions {
                base_url: fetch.base_url.clone(),
                timeout: fetch.timeout,
                cache_dir: fetch.cache_dir.clone(),
            })?)
        }
        FetchSource::Local => {
            info!("Reading structures from {:?}", fetch.local_dir);
            Pipeline::new(LocalFetcher::new(fetch.local_dir.clone()))
        }
    };
    Ok(pipeline.with_preparer(RuleBasedPreparer::new(preparation)))
}

fn summarize(result: &BatchResult) -> Result<()> {
    for (case_id, failure) in result.failures() {
        error!("Case '{}' failed: {}", case_id, failure);
        eprintln!("✗ {} failed at the {} stage: {}", case_id, failure.stage, failure.error);
    }

    if result.cancelled {
        return Err(CliError::Cancelled {
            not_attempted: result.not_attempted.len(),
        });
    }

    let failed = result.failures().count();
    if failed > 0 {
        if !result.not_attempted.is_empty() {
            let skipped: Vec<&str> = result.not_attempted.iter().map(|id| id.as_str()).collect();
            eprintln!("Not attempted: {}", skipped.join(", "));
        }
        return Err(CliError::CasesFailed { failed });
    }

    println!(
        "Prepared {} structure(s).",
        result.succeeded().count()
    );
    Ok(())
}
