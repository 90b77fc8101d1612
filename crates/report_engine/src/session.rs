use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use billing_ingest::Ingestor;
use models::{Dataset, FilterCriteria, GroupKey, RankingRow, TrendRow, TOP_N_DEFAULT};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{top_n, trend};
use crate::auth::AuthenticatedUser;
use crate::error::{ReportError, Result};
use crate::filter::{filter, FilterOptions};

/// Datasets kept per session for repeated loads of the same input.
const MEMO_CAPACITY: usize = 8;

/// Informational outcomes: the report ran but a view has nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportWarning {
    EmptyTrend,
    EmptyRanking,
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportWarning::EmptyTrend => f.write_str("No data matches the filters for the trend"),
            ReportWarning::EmptyRanking => {
                f.write_str("No data matches the filters for the ranking")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub criteria: FilterCriteria,
    pub trend: Vec<TrendRow>,
    pub ranking: Vec<RankingRow>,
    pub warnings: Vec<ReportWarning>,
}

/// Filter and aggregate one dataset. The trend honours every predicate; the
/// ranking drops the service code predicate so it always compares services.
pub fn build_report(
    dataset: &Dataset,
    criteria: &FilterCriteria,
    n: usize,
    key: GroupKey,
) -> Report {
    let trend_rows = trend(&filter(dataset, criteria));
    let ranking_rows = top_n(&filter(dataset, &criteria.without_service_code()), n, key);

    let mut warnings = Vec::new();
    if trend_rows.is_empty() {
        warnings.push(ReportWarning::EmptyTrend);
    }
    if ranking_rows.is_empty() {
        warnings.push(ReportWarning::EmptyRanking);
    }

    Report {
        criteria: criteria.clone(),
        trend: trend_rows,
        ranking: ranking_rows,
        warnings,
    }
}

#[derive(Debug, Clone, Default)]
enum DatasetState {
    #[default]
    NotLoaded,
    Loaded {
        dataset: Arc<Dataset>,
        source: String,
    },
}

/// Per-user report context. The caller owns it for the length of an
/// interaction; a new load replaces whatever was loaded before.
#[derive(Debug)]
pub struct ReportSession {
    user: AuthenticatedUser,
    state: DatasetState,
    memo: HashMap<String, Arc<Dataset>>,
    top_n: usize,
    group_key: GroupKey,
}

impl ReportSession {
    pub fn new(user: AuthenticatedUser) -> Self {
        Self {
            user,
            state: DatasetState::NotLoaded,
            memo: HashMap::new(),
            top_n: TOP_N_DEFAULT,
            group_key: GroupKey::ServiceCode,
        }
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_group_key(mut self, key: GroupKey) -> Self {
        self.group_key = key;
        self
    }

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn group_key(&self) -> GroupKey {
        self.group_key
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, DatasetState::Loaded { .. })
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        match &self.state {
            DatasetState::Loaded { dataset, .. } => Some(dataset),
            DatasetState::NotLoaded => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match &self.state {
            DatasetState::Loaded { source, .. } => Some(source),
            DatasetState::NotLoaded => None,
        }
    }

    /// Loads a dataset, reusing a memoized one when the ingestor's signature
    /// has been seen. On failure the session is left without a dataset.
    pub fn load(&mut self, ingestor: &dyn Ingestor) -> Result<&Dataset> {
        self.state = DatasetState::NotLoaded;
        let source = ingestor.describe();
        let signature = ingestor.signature();

        let cached = signature.as_ref().and_then(|s| self.memo.get(s)).cloned();
        let dataset = match cached {
            Some(dataset) => {
                info!(user = %self.user.name(), %source, "reusing memoized dataset");
                dataset
            }
            None => {
                let dataset = Arc::new(ingestor.ingest().inspect_err(|e| {
                    warn!(user = %self.user.name(), %source, error = %e, "ingestion failed");
                })?);
                if let Some(sig) = signature {
                    if self.memo.len() >= MEMO_CAPACITY {
                        self.memo.clear();
                    }
                    self.memo.insert(sig, Arc::clone(&dataset));
                }
                dataset
            }
        };

        info!(user = %self.user.name(), %source, records = dataset.len(), "dataset loaded");
        self.state = DatasetState::Loaded { dataset, source };
        self.dataset().ok_or(ReportError::NoDataset)
    }

    /// Drops the current dataset.
    pub fn clear(&mut self) {
        self.state = DatasetState::NotLoaded;
    }

    pub fn options(&self) -> Option<FilterOptions> {
        self.dataset().and_then(FilterOptions::from_dataset)
    }

    pub fn run(&self, criteria: &FilterCriteria) -> Result<Report> {
        let dataset = self.dataset().ok_or(ReportError::NoDataset)?;
        let report = build_report(dataset, criteria, self.top_n, self.group_key);

        for w in &report.warnings {
            warn!(user = %self.user.name(), "{}", w);
        }
        info!(
            user = %self.user.name(),
            trend_rows = report.trend.len(),
            ranking_rows = report.ranking.len(),
            "report built"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialStore;
    use billing_ingest::{DataSourceError, FileIngestor};
    use models::{BillingRecord, Period, PeriodRange, ServiceCodeSelector, UserCredential};
    use std::cell::Cell;
    use std::collections::BTreeMap;

    const CSV: &str = "PERIODO,CODSERV,MTOTOTFAC,ESTADO,SERCTO\n\
                       2024-01,A,100,OK,1\n\
                       2024-01,B,50,OK,2\n\
                       2024-02,A,30,BAD,3\n";

    fn user() -> AuthenticatedUser {
        let mut users = BTreeMap::new();
        users.insert("ana".to_string(), UserCredential::Plain { password: "pw".to_string() });
        CredentialStore::new(users).authenticate("ana", "pw").unwrap()
    }

    fn p(s: &str) -> Period {
        Period::parse(s).unwrap()
    }

    fn example_dataset() -> Dataset {
        let rec = |period: &str, code: &str, amount: f64, status: &str| BillingRecord {
            period: p(period),
            service_code: code.to_string(),
            service_name: None,
            total_amount: amount,
            status: status.to_string(),
            contract_id: None,
        };
        Dataset::new(vec![
            rec("2024-01", "A", 100.0, "OK"),
            rec("2024-01", "B", 50.0, "OK"),
            rec("2024-02", "A", 30.0, "BAD"),
        ])
    }

    /// Counts how often the source is actually read.
    struct CountingIngestor {
        calls: Cell<usize>,
        signature: Option<String>,
        fail: bool,
    }

    impl CountingIngestor {
        fn new(signature: Option<&str>) -> Self {
            Self { calls: Cell::new(0), signature: signature.map(str::to_string), fail: false }
        }
    }

    impl Ingestor for CountingIngestor {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn signature(&self) -> Option<String> {
            self.signature.clone()
        }

        fn ingest(&self) -> billing_ingest::Result<Dataset> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(DataSourceError::MissingColumns(vec!["PERIODO".to_string()]))
            } else {
                Ok(example_dataset())
            }
        }
    }

    #[test]
    fn test_ok_statuses_over_two_months() {
        let ds = example_dataset();
        let criteria = FilterCriteria::new(
            ServiceCodeSelector::All,
            ["OK"],
            PeriodRange::new(p("2024-01"), p("2024-02")),
        );

        assert_eq!(filter(&ds, &criteria).len(), 2);

        let report = build_report(&ds, &criteria, 10, GroupKey::ServiceCode);
        assert_eq!(
            report.trend,
            vec![TrendRow { period: "2024-01".to_string(), total_amount: 150.0, record_count: 2 }]
        );
        assert_eq!(
            report.ranking,
            vec![
                RankingRow { group: "A".to_string(), total_amount: 100.0 },
                RankingRow { group: "B".to_string(), total_amount: 50.0 },
            ]
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_ranking_ignores_service_selection() {
        let ds = example_dataset();
        let criteria = FilterCriteria::new(
            ServiceCodeSelector::from("B"),
            ["OK", "BAD"],
            PeriodRange::new(p("2024-01"), p("2024-02")),
        );

        let report = build_report(&ds, &criteria, 10, GroupKey::ServiceCode);

        assert_eq!(report.trend.len(), 1);
        assert_eq!(report.trend[0].total_amount, 50.0);
        assert_eq!(report.ranking[0], RankingRow { group: "A".to_string(), total_amount: 130.0 });
    }

    #[test]
    fn test_empty_results_are_warnings() {
        let ds = example_dataset();
        let criteria = FilterCriteria::new(
            ServiceCodeSelector::from("Z"),
            ["OK"],
            PeriodRange::new(p("2024-01"), p("2024-02")),
        );
        let report = build_report(&ds, &criteria, 10, GroupKey::ServiceCode);
        assert_eq!(report.warnings, vec![ReportWarning::EmptyTrend]);
        assert_eq!(report.ranking.len(), 2);

        let none = FilterCriteria::new(
            ServiceCodeSelector::All,
            Vec::<String>::new(),
            PeriodRange::new(p("2024-01"), p("2024-02")),
        );
        let report = build_report(&ds, &none, 10, GroupKey::ServiceCode);
        assert_eq!(report.warnings, vec![ReportWarning::EmptyTrend, ReportWarning::EmptyRanking]);
    }

    #[test]
    fn test_run_without_dataset() {
        let session = ReportSession::new(user());
        assert!(!session.is_loaded());
        assert!(session.options().is_none());
        let criteria = FilterCriteria::new(
            ServiceCodeSelector::All,
            ["OK"],
            PeriodRange::new(p("2024-01"), p("2024-02")),
        );
        assert!(matches!(session.run(&criteria), Err(ReportError::NoDataset)));
    }

    #[test]
    fn test_load_then_run() {
        let mut session = ReportSession::new(user()).with_top_n(1);
        let ingestor = FileIngestor::from_bytes("upload.csv", CSV.as_bytes().to_vec()).unwrap();

        assert_eq!(session.load(&ingestor).unwrap().len(), 3);
        assert_eq!(session.source(), Some("file upload.csv"));

        let criteria = session.options().unwrap().default_criteria().unwrap();
        let report = session.run(&criteria).unwrap();

        assert_eq!(report.trend.len(), 2);
        assert_eq!(report.ranking, vec![RankingRow { group: "A".to_string(), total_amount: 130.0 }]);
    }

    #[test]
    fn test_memoized_by_signature() {
        let mut session = ReportSession::new(user());
        let ingestor = CountingIngestor::new(Some("sig-1"));

        session.load(&ingestor).unwrap();
        session.load(&ingestor).unwrap();
        assert_eq!(ingestor.calls.get(), 1);

        let other = CountingIngestor::new(Some("sig-2"));
        session.load(&other).unwrap();
        assert_eq!(other.calls.get(), 1);
    }

    #[test]
    fn test_same_bytes_in_another_format_are_read_again() {
        let mut session = ReportSession::new(user());
        let csv = FileIngestor::from_bytes("x.csv", CSV.as_bytes().to_vec()).unwrap();
        let xlsx = FileIngestor::from_bytes("x.xlsx", CSV.as_bytes().to_vec()).unwrap();

        session.load(&csv).unwrap();
        let err = session.load(&xlsx).unwrap_err();

        assert!(matches!(err, ReportError::DataSource(DataSourceError::Workbook(_))));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_unsigned_sources_are_always_read() {
        let mut session = ReportSession::new(user());
        let ingestor = CountingIngestor::new(None);

        session.load(&ingestor).unwrap();
        session.load(&ingestor).unwrap();
        assert_eq!(ingestor.calls.get(), 2);
    }

    #[test]
    fn test_failed_load_leaves_session_empty() {
        let mut session = ReportSession::new(user());
        session.load(&CountingIngestor::new(None)).unwrap();
        assert!(session.is_loaded());

        let mut failing = CountingIngestor::new(Some("bad"));
        failing.fail = true;
        let err = session.load(&failing).unwrap_err();

        assert!(matches!(err, ReportError::DataSource(DataSourceError::MissingColumns(_))));
        assert!(!session.is_loaded());
        assert!(session.dataset().is_none());
    }

    #[test]
    fn test_clear_drops_dataset() {
        let mut session = ReportSession::new(user());
        session.load(&CountingIngestor::new(None)).unwrap();
        session.clear();
        assert!(!session.is_loaded());
        assert_eq!(session.user().name(), "ana");
    }
}
