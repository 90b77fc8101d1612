//! # Settings Loader
//!
//! Loads the billing report configuration (`report_settings.json`): which data
//! source feeds the report, the user credentials allowed to open it, and the
//! ranking options.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/report_settings.json")?;
//!
//! // Load from default location
//! let settings = settings_loader::load_default_settings()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use models::ReportSettings;

pub const DEFAULT_SETTINGS_FILE: &str = "report_settings.json";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ReportSettings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: ReportSettings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from the default location (report_settings.json in the current directory)
pub fn load_default_settings() -> Result<ReportSettings> {
    load_settings(DEFAULT_SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::SourceSettings;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_settings_from_path() {
        let file = write_settings(
            r#"{ "source": { "kind": "file", "path": "facturacion.xlsx" }, "top_n": 3 }"#,
        );
        let settings = load_settings(file.path()).unwrap();
        assert!(matches!(settings.source, SourceSettings::File { .. }));
        assert_eq!(settings.top_n(), 3);
    }

    #[test]
    fn test_load_settings_reports_bad_json() {
        let file = write_settings("{ not json");
        let err = load_settings(file.path()).unwrap_err();
        assert!(err.to_string().contains("Parsing settings JSON"));
    }

    #[test]
    fn test_load_settings_reports_missing_file() {
        let err = load_settings("definitely/missing/report_settings.json").unwrap_err();
        assert!(err.to_string().contains("Reading settings file"));
    }

    #[test]
    fn test_example_settings_parse() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../report_settings.example.json");
        let settings = load_settings(path).unwrap();
        match &settings.source {
            SourceSettings::Query(q) => assert_eq!(q.timeout_secs, 30),
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(settings.users.len(), 2);
        assert_eq!(settings.group_key(), models::GroupKey::ServiceName);
    }
}
