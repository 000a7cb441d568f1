use crate::cli::PrepareArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use memprep::core::fetch::OrientationMetadata;
use memprep::core::io::format::write_structure;
use memprep::core::io::pdb::PdbFile;
use memprep::core::io::report::export_table;
use memprep::core::io::traits::MolecularFile;
use memprep::core::selection::select;
use memprep::engine::progress::ProgressReporter;
use memprep::engine::protonation;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: PrepareArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let prepare_config = config::build_prepare_config(&args)?;

    info!("Loading input structure from {:?}", &args.input);
    let (system, metadata) =
        PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;
    let orientation = OrientationMetadata::from_header(&metadata, args.input.display().to_string());
    if let Some(half_thickness) = orientation.membrane_half_thickness {
        info!("Membrane half-thickness from header: {:.1} Å", half_thickness);
    }

    let filtered = select(system, &prepare_config.selection)
        .map_err(|e| CliError::Argument(e.to_string()))?;

    let handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    let (prepared, report) = tokio::task::block_in_place(|| {
        protonation::prepare(filtered, &orientation, &prepare_config.preparation, &reporter)
    })
    .map_err(|e| CliError::Other(e.into()))?;

    write_structure(&prepared, &args.output).map_err(|e| CliError::Other(e.into()))?;
    println!("Prepared structure written to: {}", args.output.display());

    if let Some(report_path) = &args.report {
        export_table(&report, report_path).map_err(|e| CliError::Other(e.into()))?;
        println!("Residue report written to: {}", report_path.display());
    }

    let summary = report.summary();
    println!(
        "{} residue(s): {} protonation change(s), {} amide flip(s), {} disulfide residue(s)",
        summary.residues,
        summary.protonation_changes,
        summary.amide_flips,
        summary.disulfide_residues
    );
    Ok(())
}
