//! Billing report generation: authenticate, load a dataset, filter it and
//! produce the monthly trend and the top-N service ranking.
//!
//! ```rust,no_run
//! use billing_ingest::FileIngestor;
//! use report_engine::{open_session, ReportOutput, write_report_json};
//!
//! let settings = settings_loader::load_default_settings()?;
//! let mut session = open_session(&settings, "ana", "secret")?;
//! session.load(&FileIngestor::open("data/facturacion.xlsx")?)?;
//!
//! let criteria = session.options().and_then(|o| o.default_criteria());
//! if let Some(criteria) = criteria {
//!     let report = session.run(&criteria)?;
//!     let output = ReportOutput::new(&session, report);
//!     write_report_json(&output, "report/report.json".as_ref(), true)?;
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod aggregate;
pub mod auth;
pub mod error;
pub mod filter;
pub mod output;
pub mod session;

use models::ReportSettings;

pub use aggregate::{top_n, trend};
pub use auth::{hash_password, AuthenticatedUser, AuthenticationFailure, CredentialStore};
pub use error::{ReportError, Result};
pub use filter::{filter, FilterOptions, FilteredView, ReportRequest};
pub use output::{write_report_json, ReportMetadata, ReportOutput};
pub use session::{build_report, Report, ReportSession, ReportWarning};

/// Authenticates against the configured users and opens a session carrying
/// the configured ranking options.
pub fn open_session(
    settings: &ReportSettings,
    username: &str,
    password: &str,
) -> Result<ReportSession> {
    let store = CredentialStore::new(settings.users.clone());
    let user = store.authenticate(username, password)?;
    Ok(ReportSession::new(user)
        .with_top_n(settings.top_n())
        .with_group_key(settings.group_key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_ingest::FileIngestor;
    use models::{GroupKey, Period, SourceSettings, UserCredential};
    use std::collections::BTreeMap;

    fn settings() -> ReportSettings {
        let mut users = BTreeMap::new();
        users.insert("ana".to_string(), UserCredential::Plain { password: "secret".to_string() });
        ReportSettings {
            source: SourceSettings::File { path: "billing.csv".into() },
            users,
            top_n: Some(3),
            group_by: None,
        }
    }

    #[test]
    fn test_open_session_applies_settings() {
        let session = open_session(&settings(), "ana", "secret").unwrap();
        assert_eq!(session.user().name(), "ana");
        assert_eq!(session.top_n(), 3);
        assert_eq!(session.group_key(), GroupKey::ServiceCode);
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_open_session_rejects_bad_password() {
        let err = open_session(&settings(), "ana", "nope").unwrap_err();
        assert!(matches!(err, ReportError::Authentication(_)));
        assert_eq!(err.to_string(), "Invalid username or password");
    }

    #[test]
    fn test_empty_dataset_reports_warnings() {
        let mut session = open_session(&settings(), "ana", "secret").unwrap();
        let header_only = b"PERIODO,CODSERV,MTOTOTFAC,ESTADO,SERCTO\n".to_vec();
        session
            .load(&FileIngestor::from_bytes("billing.csv", header_only).unwrap())
            .unwrap();
        assert!(session.options().is_none());

        let request = ReportRequest {
            from: Some(Period::parse("2024-03").unwrap()),
            to: Some(Period::parse("2024-01").unwrap()),
            ..ReportRequest::default()
        };
        let report = session.run(&request.resolve(session.options().as_ref())).unwrap();

        assert!(report.trend.is_empty());
        assert!(report.ranking.is_empty());
        assert_eq!(
            report.warnings,
            vec![ReportWarning::EmptyTrend, ReportWarning::EmptyRanking]
        );
    }
}
