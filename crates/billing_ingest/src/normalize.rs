use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use models::{BillingRecord, Dataset, Period};
use tracing::{debug, info};

use crate::error::{DataSourceError, Result};

pub const COL_PERIOD: &str = "PERIODO";
pub const COL_SERVICE_CODE: &str = "CODSERV";
pub const COL_SERVICE_NAME: &str = "NOMSER";
pub const COL_TOTAL_AMOUNT: &str = "MTOTOTFAC";
pub const COL_STATUS: &str = "ESTADO";
pub const COL_CONTRACT: &str = "SERCTO";

/// Columns an uploaded billing file must carry.
pub const REQUIRED_FILE_COLUMNS: [&str; 5] = [
    COL_PERIOD,
    COL_SERVICE_CODE,
    COL_TOTAL_AMOUNT,
    COL_STATUS,
    COL_CONTRACT,
];

/// A cell as the source delivered it, before any billing semantics apply.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Number(f64),
    Date(NaiveDate),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s)
        }
    }

    /// Text rendering. Whole numbers print without a fractional part so that
    /// numeric service codes stay stable identifiers.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Number(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            RawValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Monetary amount. Blank or unparseable cells contribute nothing.
    pub fn as_amount(&self) -> f64 {
        match self {
            RawValue::Integer(i) => *i as f64,
            RawValue::Number(f) if f.is_finite() => *f,
            RawValue::Text(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn as_period(&self) -> Option<Period> {
        match self {
            RawValue::Text(s) => Period::parse(s).ok(),
            RawValue::Date(d) => Some(Period::from_date(*d)),
            _ => None,
        }
    }
}

/// One source row mapped onto the billing columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub period: RawValue,
    pub service_code: RawValue,
    pub service_name: RawValue,
    pub total_amount: RawValue,
    pub status: RawValue,
    pub contract_id: RawValue,
}

/// Positions of the billing columns inside a header row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMap {
    pub period: usize,
    pub service_code: usize,
    pub service_name: Option<usize>,
    pub total_amount: usize,
    pub status: usize,
    pub contract_id: usize,
}

impl ColumnMap {
    /// Header names are compared trimmed and case-insensitively.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_ascii_uppercase(), idx))
            .collect();

        let missing: Vec<String> = REQUIRED_FILE_COLUMNS
            .iter()
            .filter(|c| !map.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DataSourceError::MissingColumns(missing));
        }

        Ok(Self {
            period: map[COL_PERIOD],
            service_code: map[COL_SERVICE_CODE],
            service_name: map.get(COL_SERVICE_NAME).copied(),
            total_amount: map[COL_TOTAL_AMOUNT],
            status: map[COL_STATUS],
            contract_id: map[COL_CONTRACT],
        })
    }

    pub fn row_from<F>(&self, mut cell: F) -> RawRow
    where
        F: FnMut(usize) -> RawValue,
    {
        RawRow {
            period: cell(self.period),
            service_code: cell(self.service_code),
            service_name: self.service_name.map(&mut cell).unwrap_or_default(),
            total_amount: cell(self.total_amount),
            status: cell(self.status),
            contract_id: cell(self.contract_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

/// Turns raw rows into the dataset. Rows whose period does not parse are
/// dropped without raising.
pub fn normalize_rows(rows: Vec<RawRow>) -> (Dataset, IngestStats) {
    let mut stats = IngestStats {
        rows_read: rows.len(),
        ..IngestStats::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for (row_idx, row) in rows.into_iter().enumerate() {
        let Some(period) = row.period.as_period() else {
            debug!(row = row_idx + 1, period = ?row.period, "dropping row with invalid period");
            stats.rows_dropped += 1;
            continue;
        };

        records.push(BillingRecord {
            period,
            service_code: row.service_code.as_text().unwrap_or_default(),
            service_name: row.service_name.as_text(),
            total_amount: row.total_amount.as_amount(),
            status: row.status.as_text().unwrap_or_default(),
            contract_id: row.contract_id.as_text(),
        });
    }

    stats.rows_kept = records.len();
    info!(
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        rows_dropped = stats.rows_dropped,
        "normalized billing rows"
    );
    (Dataset::new(records), stats)
}

/// Date strings as workbooks and databases hand them out:
/// "2024-08-25 00:00:00", "2024-08-25T00:00:00" or "2024-08-25".
pub(crate) fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Excel serial date conversion using the 1899-12-30 base.
pub(crate) fn excel_serial_to_date(v: f64) -> Option<NaiveDate> {
    if !v.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(v.floor() as i64))
}
