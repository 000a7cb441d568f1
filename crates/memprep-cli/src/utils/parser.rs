use memprep::core::io::report::ReportFormat;
use memprep::workflows::worklist::{Worklist, WorklistError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Unknown report format '{0}'. Expected 'xlsx' or 'csv'.")]
    UnknownReportFormat(String),

    #[error("Preset name cannot be empty in '{0}'.")]
    EmptyPreset(String),
}

/// How the `--worklist` argument names its cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorklistSpec {
    /// `@name`, a built-in preset.
    Preset(String),
    /// An existing file listing identifiers.
    File(PathBuf),
    /// Identifiers given inline, separated by commas or whitespace.
    List(String),
}

impl WorklistSpec {
    pub fn load(&self) -> Result<Worklist, WorklistError> {
        match self {
            WorklistSpec::Preset(name) => Worklist::preset(name),
            WorklistSpec::File(path) => Worklist::from_file(path),
            WorklistSpec::List(text) => Worklist::parse_list(text),
        }
    }
}

pub fn parse_worklist_spec(arg: &str) -> Result<WorklistSpec, ParseError> {
    if let Some(name) = arg.strip_prefix('@') {
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::EmptyPreset(arg.to_string()));
        }
        return Ok(WorklistSpec::Preset(name.to_string()));
    }
    let path = Path::new(arg);
    if path.is_file() {
        Ok(WorklistSpec::File(path.to_path_buf()))
    } else {
        Ok(WorklistSpec::List(arg.to_string()))
    }
}

pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidKeyValue(pair.to_string())),
    }
}

pub fn parse_report_format(name: &str) -> Result<ReportFormat, ParseError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "xlsx" => Ok(ReportFormat::Xlsx),
        "csv" => Ok(ReportFormat::Csv),
        _ => Err(ParseError::UnknownReportFormat(name.to_string())),
    }
}
