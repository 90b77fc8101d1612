mod period;
mod settings;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use period::{Period, PeriodParseError};
pub use settings::{
    QuerySettings, ReportSettings, SourceSettings, UserCredential, DEFAULT_QUERY_TIMEOUT_SECS,
};

/// Length of the ranking view unless configured otherwise.
pub const TOP_N_DEFAULT: usize = 10;

/// Wildcard accepted by [`ServiceCodeSelector`].
pub const ALL_SERVICES: &str = "ALL";

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// Input models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub period: Period,
    pub service_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub total_amount: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

/// Normalized billing rows. Read-only once built; filters and aggregations
/// derive new views from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<BillingRecord>,
}

impl Dataset {
    pub fn new(records: Vec<BillingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BillingRecord] {
        &self.records
    }

    pub fn get(&self, idx: usize) -> Option<&BillingRecord> {
        self.records.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BillingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a BillingRecord;
    type IntoIter = std::slice::Iter<'a, BillingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// Filter models
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ServiceCodeSelector {
    #[default]
    All,
    Code(String),
}

impl ServiceCodeSelector {
    pub fn matches(&self, service_code: &str) -> bool {
        match self {
            ServiceCodeSelector::All => true,
            ServiceCodeSelector::Code(code) => code == service_code,
        }
    }
}

impl From<&str> for ServiceCodeSelector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ALL_SERVICES) {
            ServiceCodeSelector::All
        } else {
            ServiceCodeSelector::Code(s.to_string())
        }
    }
}

impl FromStr for ServiceCodeSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ServiceCodeSelector::from(s))
    }
}

impl fmt::Display for ServiceCodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceCodeSelector::All => f.write_str(ALL_SERVICES),
            ServiceCodeSelector::Code(code) => f.write_str(code),
        }
    }
}

impl Serialize for ServiceCodeSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceCodeSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ServiceCodeSelector::from(raw.as_str()))
    }
}

/// Inclusive month range. A range whose start is after its end matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    pub fn new(start: Period, end: Period) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub service: ServiceCodeSelector,
    pub statuses: BTreeSet<String>,
    pub range: PeriodRange,
}

impl FilterCriteria {
    pub fn new(
        service: ServiceCodeSelector,
        statuses: impl IntoIterator<Item = impl Into<String>>,
        range: PeriodRange,
    ) -> Self {
        Self {
            service,
            statuses: statuses.into_iter().map(Into::into).collect(),
            range,
        }
    }

    /// Same status and period predicates with the service code opened up,
    /// used for the ranking view.
    pub fn without_service_code(&self) -> Self {
        Self {
            service: ServiceCodeSelector::All,
            ..self.clone()
        }
    }
}

// Output models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    ServiceCode,
    ServiceName,
}

impl GroupKey {
    /// Grouping value of a record. Records without a service name group
    /// under their service code.
    pub fn value_of<'a>(&self, record: &'a BillingRecord) -> &'a str {
        match self {
            GroupKey::ServiceCode => &record.service_code,
            GroupKey::ServiceName => record
                .service_name
                .as_deref()
                .unwrap_or(&record.service_code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    pub period: String,
    pub total_amount: f64,
    pub record_count: usize,
}

impl TrendRow {
    pub fn rounded(&self) -> Self {
        Self {
            total_amount: round2(self.total_amount),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub group: String,
    pub total_amount: f64,
}

impl RankingRow {
    pub fn rounded(&self) -> Self {
        Self {
            total_amount: round2(self.total_amount),
            ..self.clone()
        }
    }
}
