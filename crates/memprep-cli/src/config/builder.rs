use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FilePreparationConfig};
use super::models::{FetchSettings, PrepareConfig, RunConfig};
use crate::cache::CacheManager;
use crate::cli::{PrepareArgs, RunArgs};
use crate::error::{CliError, Result};
use crate::utils::parser;
use directories::BaseDirs;
use memprep::engine::config::{
    ConfigError, HisStrategy, PreparationConfig, PreparationConfigBuilder,
};
use memprep::workflows::batch::{BatchOptions, FailurePolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn build_run_config(args: &RunArgs, cache: &CacheManager) -> Result<RunConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = load_file_config(args.config.as_deref())?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let fetch_file = file_config.fetch.take().unwrap_or_default();
    let batch_file = file_config.batch.take().unwrap_or_default();
    let preparation_file = file_config.preparation.take().unwrap_or_default();

    let timeout_secs = fetch_file.timeout_secs.unwrap_or(defaults.timeout_secs);
    if timeout_secs == 0 {
        return Err(CliError::Config(
            "`fetch.timeout-secs` must be at least 1".to_string(),
        ));
    }

    let cache_dir = if args.no_cache {
        None
    } else {
        Some(
            args.cache_dir
                .clone()
                .or(fetch_file.cache_dir.map(|p| expand_home(&p)))
                .unwrap_or_else(|| cache.path().to_path_buf()),
        )
    };

    let fetch = FetchSettings {
        source: args.source.or(fetch_file.source).unwrap_or_default(),
        base_url: fetch_file.base_url.unwrap_or(defaults.base_url),
        local_dir: args
            .local_dir
            .clone()
            .or(fetch_file.local_dir.map(|p| expand_home(&p)))
            .unwrap_or_else(|| PathBuf::from(&defaults.local_dir)),
        cache_dir,
        timeout: Duration::from_secs(timeout_secs),
    };

    let jobs = args.jobs.or(batch_file.jobs).unwrap_or(defaults.jobs);
    let max_concurrent_fetches = fetch_file
        .max_concurrent
        .unwrap_or(defaults.max_concurrent);
    if jobs == 0 || max_concurrent_fetches == 0 {
        return Err(CliError::Config(
            "`batch.jobs` and `fetch.max-concurrent` must be at least 1".to_string(),
        ));
    }

    let continue_on_error = args.continue_on_error
        || batch_file
            .continue_on_error
            .unwrap_or(defaults.continue_on_error);
    let report_format_name = args
        .report_format
        .as_deref()
        .or(batch_file.report_format.as_deref())
        .unwrap_or(defaults.report_format.as_str());
    let report_format = parser::parse_report_format(report_format_name)
        .map_err(|e| CliError::Config(e.to_string()))?;

    let batch = BatchOptions {
        policy: if continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        },
        selection: args
            .selection
            .clone()
            .or(batch_file.selection)
            .unwrap_or(defaults.selection),
        jobs,
        max_concurrent_fetches,
        report_format,
    };

    let preparation = merge_preparation(
        args.ph,
        args.his_strategy,
        preparation_file,
        defaults.verbose,
    )?;

    Ok(RunConfig {
        fetch,
        preparation,
        batch,
    })
}

pub fn build_prepare_config(args: &PrepareArgs) -> Result<PrepareConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = load_file_config(args.config.as_deref())?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let batch_file = file_config.batch.take().unwrap_or_default();
    let preparation_file = file_config.preparation.take().unwrap_or_default();

    Ok(PrepareConfig {
        preparation: merge_preparation(
            args.ph,
            args.his_strategy,
            preparation_file,
            defaults.verbose,
        )?,
        selection: args
            .selection
            .clone()
            .or(batch_file.selection)
            .unwrap_or(defaults.selection),
    })
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => FileConfig::from_file(path),
        None => Ok(FileConfig::default()),
    }
}

fn merge_preparation(
    cli_ph: Option<f64>,
    cli_his_strategy: Option<HisStrategy>,
    file_val: FilePreparationConfig,
    default_verbose: bool,
) -> Result<PreparationConfig> {
    let mut builder = PreparationConfigBuilder::new()
        .verbose(file_val.verbose.unwrap_or(default_verbose))
        .return_details(true);

    if let Some(ph) = cli_ph.or(file_val.ph) {
        builder = builder.ph(ph);
    }
    if let Some(strategy) = cli_his_strategy.or(file_val.his_strategy) {
        builder = builder.his_strategy(strategy);
    }
    if let Some(enabled) = file_val.flip_amides {
        builder = builder.flip_amides(enabled);
    }
    if let Some(enabled) = file_val.strip_hydrogens {
        builder = builder.strip_hydrogens(enabled);
    }
    if let Some(cutoff) = file_val.hbond_cutoff {
        builder = builder.hbond_cutoff(cutoff);
    }
    if let Some(cutoff) = file_val.disulfide_cutoff {
        builder = builder.disulfide_cutoff(cutoff);
    }

    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), BaseDirs::new()) {
        (Ok(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => path.to_path_buf(),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        match key {
            "preparation.ph" => {
                config
                    .preparation
                    .get_or_insert_with(Default::default)
                    .ph = Some(parse_value(key, value_str, "float")?);
            }
            "preparation.his-strategy" => {
                config
                    .preparation
                    .get_or_insert_with(Default::default)
                    .his_strategy = Some(
                    value_str
                        .parse()
                        .map_err(|e: ConfigError| CliError::Config(e.to_string()))?,
                );
            }
            "preparation.flip-amides" => {
                config
                    .preparation
                    .get_or_insert_with(Default::default)
                    .flip_amides = Some(parse_value(key, value_str, "boolean")?);
            }
            "preparation.hbond-cutoff" => {
                config
                    .preparation
                    .get_or_insert_with(Default::default)
                    .hbond_cutoff = Some(parse_value(key, value_str, "float")?);
            }
            "fetch.timeout-secs" => {
                config
                    .fetch
                    .get_or_insert_with(Default::default)
                    .timeout_secs = Some(parse_value(key, value_str, "integer")?);
            }
            "fetch.base-url" => {
                config.fetch.get_or_insert_with(Default::default).base_url =
                    Some(value_str.to_string());
            }
            "batch.selection" => {
                config.batch.get_or_insert_with(Default::default).selection =
                    Some(value_str.to_string());
            }
            "batch.jobs" => {
                config.batch.get_or_insert_with(Default::default).jobs =
                    Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchSource;
    use memprep::core::io::report::ReportFormat;
    use std::fs;
    use tempfile::tempdir;

    fn base_run_args() -> RunArgs {
        RunArgs {
            worklist: "1z98".to_string(),
            outdir: PathBuf::from("out"),
            config: None,
            continue_on_error: false,
            source: None,
            local_dir: None,
            cache_dir: None,
            no_cache: false,
            selection: None,
            ph: None,
            his_strategy: None,
            report_format: None,
            jobs: None,
            set_values: vec![],
        }
    }

    fn base_prepare_args() -> PrepareArgs {
        PrepareArgs {
            input: PathBuf::from("in.pdb"),
            output: PathBuf::from("out.pdb"),
            report: None,
            config: None,
            selection: None,
            ph: None,
            his_strategy: None,
            set_values: vec![],
        }
    }

    fn write_config(dir: &Path, toml: &str) -> PathBuf {
        let path = dir.join("memprep.toml");
        fs::write(&path, toml).unwrap();
        path
    }

    fn cache() -> CacheManager {
        CacheManager::with_path(PathBuf::from("/tmp/memprep-cache"))
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = build_run_config(&base_run_args(), &cache()).unwrap();

        assert_eq!(config.fetch.source, FetchSource::Opm);
        assert_eq!(config.fetch.base_url, memprep::core::fetch::DEFAULT_OPM_BASE_URL);
        assert_eq!(config.fetch.timeout, Duration::from_secs(60));
        assert_eq!(
            config.fetch.cache_dir,
            Some(PathBuf::from("/tmp/memprep-cache"))
        );
        assert_eq!(config.batch.policy, FailurePolicy::Abort);
        assert_eq!(config.batch.selection, "protein");
        assert_eq!(config.batch.jobs, 1);
        assert_eq!(config.batch.max_concurrent_fetches, 1);
        assert_eq!(config.batch.report_format, ReportFormat::Xlsx);
        assert_eq!(config.preparation.ph, 7.0);
        assert_eq!(config.preparation.his_strategy, HisStrategy::HbNetwork);
        assert!(config.preparation.verbose);
    }

    #[test]
    fn file_values_are_merged() {
        let dir = tempdir().unwrap();
        let mut args = base_run_args();
        args.config = Some(write_config(
            dir.path(),
            r#"
            [fetch]
            source = "local"
            local-dir = "/data/opm"
            timeout-secs = 15
            max-concurrent = 2

            [preparation]
            ph = 5.5
            flip-amides = false
            verbose = false

            [batch]
            continue-on-error = true
            jobs = 3
            report-format = "csv"
            "#,
        ));

        let config = build_run_config(&args, &cache()).unwrap();

        assert_eq!(config.fetch.source, FetchSource::Local);
        assert_eq!(config.fetch.local_dir, PathBuf::from("/data/opm"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(15));
        assert_eq!(config.batch.max_concurrent_fetches, 2);
        assert_eq!(config.batch.policy, FailurePolicy::Continue);
        assert_eq!(config.batch.jobs, 3);
        assert_eq!(config.batch.report_format, ReportFormat::Csv);
        assert_eq!(config.preparation.ph, 5.5);
        assert!(!config.preparation.flip_amides);
        assert!(!config.preparation.verbose);
    }

    #[test]
    fn precedence_is_cli_then_set_then_file() {
        let dir = tempdir().unwrap();
        let mut args = base_run_args();
        args.config = Some(write_config(
            dir.path(),
            "[preparation]\nph = 5.0\nhbond-cutoff = 3.0\n[batch]\njobs = 2\n",
        ));
        args.set_values = vec![
            "preparation.ph=6.0".to_string(),
            "preparation.hbond-cutoff=3.3".to_string(),
            "batch.jobs=5".to_string(),
        ];
        args.ph = Some(8.0);

        let config = build_run_config(&args, &cache()).unwrap();

        assert_eq!(config.preparation.ph, 8.0);
        assert!((config.preparation.hbond_cutoff - 3.3).abs() < 1e-12);
        assert_eq!(config.batch.jobs, 5);
    }

    #[test]
    fn set_values_cover_every_supported_key() {
        let mut args = base_run_args();
        args.set_values = vec![
            "preparation.his-strategy=hie".to_string(),
            "preparation.flip-amides=false".to_string(),
            "fetch.timeout-secs=5".to_string(),
            "fetch.base-url=http://mirror/pdb".to_string(),
            "batch.selection=protein and not hydrogen".to_string(),
        ];

        let config = build_run_config(&args, &cache()).unwrap();

        assert_eq!(config.preparation.his_strategy, HisStrategy::Hie);
        assert!(!config.preparation.flip_amides);
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        assert_eq!(config.fetch.base_url, "http://mirror/pdb");
        assert_eq!(config.batch.selection, "protein and not hydrogen");
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        for pair in [
            "preparation.ph=acidic",
            "batch.jobs=-1",
            "preparation.his-strategy=hip",
            "network.proxy=x",
            "missing-equals",
        ] {
            let mut args = base_run_args();
            args.set_values = vec![pair.to_string()];
            assert!(
                matches!(build_run_config(&args, &cache()), Err(CliError::Config(_))),
                "{} should be rejected",
                pair
            );
        }
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut args = base_run_args();
        args.ph = Some(15.0);
        assert!(matches!(
            build_run_config(&args, &cache()),
            Err(CliError::Config(_))
        ));

        let mut args = base_run_args();
        args.jobs = Some(0);
        assert!(matches!(
            build_run_config(&args, &cache()),
            Err(CliError::Config(_))
        ));

        let mut args = base_run_args();
        args.report_format = Some("ods".to_string());
        assert!(matches!(
            build_run_config(&args, &cache()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn cache_flags_control_cache_directory() {
        let mut args = base_run_args();
        args.no_cache = true;
        assert_eq!(build_run_config(&args, &cache()).unwrap().fetch.cache_dir, None);

        let mut args = base_run_args();
        args.cache_dir = Some(PathBuf::from("/elsewhere"));
        assert_eq!(
            build_run_config(&args, &cache()).unwrap().fetch.cache_dir,
            Some(PathBuf::from("/elsewhere"))
        );
    }

    #[test]
    fn prepare_config_uses_file_selection_and_cli_overrides() {
        let dir = tempdir().unwrap();
        let mut args = base_prepare_args();
        args.config = Some(write_config(
            dir.path(),
            "[batch]\nselection = \"chain A\"\n[preparation]\nhis-strategy = \"hid\"\n",
        ));
        args.his_strategy = Some(HisStrategy::Hie);

        let config = build_prepare_config(&args).unwrap();

        assert_eq!(config.selection, "chain A");
        assert_eq!(config.preparation.his_strategy, HisStrategy::Hie);
    }

    #[test]
    fn home_prefix_is_expanded() {
        let expanded = expand_home(Path::new("~/.cache/memprep"));
        if BaseDirs::new().is_some() {
            assert!(!expanded.starts_with("~"));
            assert!(expanded.ends_with(".cache/memprep"));
        }
        assert_eq!(expand_home(Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
    }
}
