//! Loading of billing datasets from uploaded files or from the billing database.
//!
//! Every source goes through the same normalization: periods are parsed into
//! months (rows that fail are dropped), service codes are kept as text and
//! amounts default to zero when a cell is blank.

pub mod csv_source;
pub mod error;
pub mod file;
pub mod normalize;
pub mod query;
pub mod spreadsheet;

use models::{Dataset, PeriodRange, SourceSettings};

pub use error::{DataSourceError, Result};
pub use file::{FileFormat, FileIngestor};
pub use normalize::{normalize_rows, IngestStats, RawRow, RawValue, REQUIRED_FILE_COLUMNS};
pub use query::QueryIngestor;

/// A source that can produce a billing dataset.
pub trait Ingestor {
    /// Human readable description used in logs and report metadata.
    fn describe(&self) -> String;

    /// Memoization key. Identical keys must mean identical datasets;
    /// `None` disables memoization for this source.
    fn signature(&self) -> Option<String> {
        None
    }

    fn ingest(&self) -> Result<Dataset>;
}

/// Picks the ingestor configured in the settings. `range` is pushed down into
/// the query for database sources and ignored for files.
pub fn ingestor_from_settings(
    source: &SourceSettings,
    range: Option<PeriodRange>,
) -> Result<Box<dyn Ingestor>> {
    match source {
        SourceSettings::File { path } => Ok(Box::new(FileIngestor::open(path)?)),
        SourceSettings::Query(query) => Ok(Box::new(QueryIngestor::new(query.clone(), range)?)),
    }
}
