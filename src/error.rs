use thiserror::Error;

/// Failure modes of the reporting core. Everything here is recoverable
/// at the call site: the menu warns and keeps running. Date-parse
/// failures, empty filter results and missing rate cells are deliberately
/// not variants; they are handled in-band (the "Total" sentinel, an empty
/// view, an empty display cell).
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("unsupported file format: {0} (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("schema mismatch: expected at least {expected} columns, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("export failed: {0}")]
    ExportFailure(String),
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::DataUnavailable(err.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
