//! # Spreadsheet Reading
//!
//! A small reader for Office Open XML workbooks (`.xlsx`, `.xlsm`, `.xlam`) built directly
//! on `zip` and `quick-xml`. It exposes the sheet list of a workbook and the typed,
//! non-empty cells of one named sheet, which the row loader turns into table rows.
use crate::error::IngestError;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

pub mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub mod sheet;
pub mod xlsx;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cell::{Cell, CellType};
pub use sheet::Sheet;
pub use xlsx::XlsxWorkbook;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),

    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Workbook '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFound(String, String),

    #[error("Header row {2} not found in sheet '{1}' of '{0}'")]
    MissingHeaderRow(String, String, usize),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: {3}")]
    CellValueError(String, String, String, String),
}

/// Opens a workbook, choosing the reader from the file extension.
pub fn open_workbook(path: &Path) -> Result<XlsxWorkbook, IngestError> {
    match path
        .extension()
        .and_then(OsStr::to_str)
        .map(|extension| extension.to_ascii_lowercase())
        .as_deref()
    {
        Some("xlsx") | Some("xlsm") | Some("xlam") => XlsxWorkbook::open(path),
        _ => Err(SpreadsheetError::InvalidFileFormat(path.to_string_lossy().to_string()).into()),
    }
}
