use std::fs;
use std::path::Path;

use models::Dataset;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::csv_source::read_csv;
use crate::error::{DataSourceError, Result};
use crate::normalize::normalize_rows;
use crate::spreadsheet::read_workbook;
use crate::Ingestor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Csv,
}

impl FileFormat {
    /// Detects the format from the file name extension.
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") => Ok(FileFormat::Xlsx),
            Some("csv") => Ok(FileFormat::Csv),
            _ => Err(DataSourceError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Ingests an uploaded spreadsheet or CSV export.
pub struct FileIngestor {
    name: String,
    bytes: Vec<u8>,
    format: FileFormat,
}

impl FileIngestor {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let format = FileFormat::from_name(&name)?;
        Ok(Self { name, bytes, format })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::from_bytes(path.display().to_string(), bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }
}

impl Ingestor for FileIngestor {
    fn describe(&self) -> String {
        format!("file {}", self.name)
    }

    /// Format plus content hash, so re-uploading the same file hits the memo
    /// and any change in content or in how it is read misses it.
    fn signature(&self) -> Option<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.bytes.as_slice());
        Some(format!(
            "file:{:?}:{}",
            self.format,
            hex::encode(hasher.finalize())
        ))
    }

    fn ingest(&self) -> Result<Dataset> {
        let rows = match self.format {
            FileFormat::Xlsx => read_workbook(&self.bytes)?,
            FileFormat::Csv => read_csv(&self.bytes)?,
        };
        let (dataset, stats) = normalize_rows(rows);
        info!(
            source = %self.name,
            records = dataset.len(),
            dropped = stats.rows_dropped,
            "file ingested"
        );
        Ok(dataset)
    }
}
