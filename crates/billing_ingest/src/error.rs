use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataSourceError>;

/// Anything that keeps a dataset from being loaded. Callers surface the
/// message and keep the report in its "no dataset" state.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("Workbook has no worksheets")]
    EmptyWorkbook,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Data source did not answer within {0:?}")]
    Timeout(Duration),
}
