//! Tabular report export to spreadsheet (`.xlsx`) and delimited text (`.csv`).
//!
//! Anything that can present itself as a header row plus typed data rows
//! implements [`Tabular`]; [`export_table`] picks the output format from the target
//! extension. All cells are validated before the target file is created, so a table
//! containing a value the format cannot represent leaves no partial file behind.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the single worksheet in exported workbooks.
pub const SHEET_NAME: &str = "Report";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    fn is_representable(&self) -> bool {
        match self {
            Cell::Float(value) => value.is_finite(),
            _ => true,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Integer(value) => value.to_string(),
            Cell::Float(value) => value.to_string(),
            Cell::Bool(value) => value.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Empty, Into::into)
    }
}

/// A rectangular table with a header row.
pub trait Tabular {
    fn headers(&self) -> Vec<&'static str>;
    fn rows(&self) -> Vec<Vec<Cell>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot infer a report format from '{path}' (expected .xlsx or .csv)")]
    UnsupportedFormat { path: PathBuf },
    #[error("Value at data row {row}, column '{column}' cannot be stored (non-finite number)")]
    UnsupportedValue { row: usize, column: String },
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exports `table` to `path`, overwriting any existing file.
///
/// # Errors
///
/// Returns [`ExportError::UnsupportedFormat`] for unknown extensions and
/// [`ExportError::UnsupportedValue`] when a cell holds a NaN or infinite number;
/// in both cases no file is created.
pub fn export_table(table: &impl Tabular, path: &Path) -> Result<(), ExportError> {
    let format = ReportFormat::from_path(path).ok_or_else(|| ExportError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let headers = table.headers();
    let rows = table.rows();
    validate(&headers, &rows)?;

    match format {
        ReportFormat::Xlsx => write_xlsx(&headers, &rows, path),
        ReportFormat::Csv => write_csv(&headers, &rows, path),
    }
}

fn validate(headers: &[&'static str], rows: &[Vec<Cell>]) -> Result<(), ExportError> {
    for (row_index, row) in rows.iter().enumerate() {
        if let Some(column) = row.iter().position(|cell| !cell.is_representable()) {
            return Err(ExportError::UnsupportedValue {
                row: row_index + 1,
                column: headers
                    .get(column)
                    .map_or_else(|| column.to_string(), |h| h.to_string()),
            });
        }
    }
    Ok(())
}

fn write_xlsx(headers: &[&'static str], rows: &[Vec<Cell>], path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;
        let bold = Format::new().set_bold();

        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }

        for (index, row) in rows.iter().enumerate() {
            let r = (index + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(r, c, text)?;
                    }
                    Cell::Integer(value) => {
                        worksheet.write_number(r, c, *value as f64)?;
                    }
                    Cell::Float(value) => {
                        worksheet.write_number(r, c, *value)?;
                    }
                    Cell::Bool(value) => {
                        worksheet.write_boolean(r, c, *value)?;
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

fn write_csv(headers: &[&'static str], rows: &[Vec<Cell>], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.iter().map(Cell::to_text))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use tempfile::tempdir;

    struct Sample(Vec<Vec<Cell>>);

    impl Tabular for Sample {
        fn headers(&self) -> Vec<&'static str> {
            vec!["name", "count", "score", "ok", "note"]
        }

        fn rows(&self) -> Vec<Vec<Cell>> {
            self.0.clone()
        }
    }

    fn sample(rows: usize) -> Sample {
        Sample(
            (0..rows)
                .map(|i| {
                    vec![
                        Cell::from(format!("row{}", i)),
                        Cell::Integer(i as i64),
                        Cell::Float(i as f64 * 0.5),
                        Cell::Bool(i % 2 == 0),
                        Cell::from(None::<String>),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn xlsx_has_header_plus_one_row_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case-data.xlsx");

        export_table(&sample(4), &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.height(), 5);
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("name".to_string())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("row1".to_string())));
        assert_eq!(range.get_value((2, 2)), Some(&Data::Float(0.5)));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Bool(true)));
    }

    #[test]
    fn xlsx_with_no_records_still_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");

        export_table(&sample(0), &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.height(), 1);
    }

    #[test]
    fn csv_export_writes_text_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case-data.csv");

        export_table(&sample(2), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["name,count,score,ok,note", "row0,0,0,true,", "row1,1,0.5,false,"]);
    }

    #[test]
    fn non_finite_value_is_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        let mut table = sample(3);
        table.0[2][2] = Cell::Float(f64::NAN);

        let err = export_table(&table, &path).unwrap_err();

        match err {
            ExportError::UnsupportedValue { row, column } => {
                assert_eq!(row, 3);
                assert_eq!(column, "score");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.ods");

        let err = export_table(&sample(1), &path).unwrap_err();

        assert!(matches!(err, ExportError::UnsupportedFormat { .. }));
        assert!(!path.exists());
    }
}
