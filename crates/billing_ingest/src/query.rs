use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use models::{Dataset, PeriodRange, QuerySettings};
use regex::Regex;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{DataSourceError, Result};
use crate::normalize::{
    normalize_rows, parse_date_string, RawRow, RawValue, COL_CONTRACT, COL_PERIOD,
    COL_SERVICE_CODE, COL_SERVICE_NAME, COL_STATUS, COL_TOTAL_AMOUNT,
};
use crate::Ingestor;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn validate_identifier(name: &str) -> Result<()> {
    if identifier_re().is_match(name) {
        Ok(())
    } else {
        Err(DataSourceError::InvalidIdentifier(name.to_string()))
    }
}

/// Ingests billing rows joined with the service reference table straight from
/// the database, with the period range applied inside the query.
pub struct QueryIngestor {
    settings: QuerySettings,
    range: Option<PeriodRange>,
}

impl QueryIngestor {
    pub fn new(settings: QuerySettings, range: Option<PeriodRange>) -> Result<Self> {
        validate_identifier(&settings.billing_table)?;
        validate_identifier(&settings.service_table)?;
        Ok(Self { settings, range })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    pub fn range(&self) -> Option<PeriodRange> {
        self.range
    }

    pub fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT f.{contract} AS {contract}, s.{name} AS {name}, f.{period} AS {period}, \
             f.{amount} AS {amount}, f.{status} AS {status}, f.{code} AS {code} \
             FROM {billing} f \
             JOIN {services} s ON f.{code} = s.{code}",
            contract = COL_CONTRACT,
            name = COL_SERVICE_NAME,
            period = COL_PERIOD,
            amount = COL_TOTAL_AMOUNT,
            status = COL_STATUS,
            code = COL_SERVICE_CODE,
            billing = self.settings.billing_table,
            services = self.settings.service_table,
        );
        if self.range.is_some() {
            // month prefix, so date-typed periods compare like "YYYY-MM" keys
            sql.push_str(&format!(" WHERE substr(f.{COL_PERIOD}, 1, 7) BETWEEN ? AND ?"));
        }
        sql
    }

    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&self.settings.database_url)
            .await?;

        let sql = self.sql();
        debug!(%sql, "running billing query");
        let mut query = sqlx::query(&sql);
        if let Some(range) = self.range {
            query = query.bind(range.start.key()).bind(range.end.key());
        }
        let rows = query.fetch_all(&pool).await;
        pool.close().await;

        Ok(rows?.iter().map(raw_row).collect())
    }
}

impl Ingestor for QueryIngestor {
    fn describe(&self) -> String {
        match self.range {
            Some(r) => format!(
                "query {}x{} [{}..{}]",
                self.settings.billing_table, self.settings.service_table, r.start, r.end
            ),
            None => format!(
                "query {}x{}",
                self.settings.billing_table, self.settings.service_table
            ),
        }
    }

    fn ingest(&self) -> Result<Dataset> {
        let rows = block_on_with_timeout(self.timeout(), self.fetch_rows())?;

        let (dataset, stats) = normalize_rows(rows);
        info!(
            source = %self.describe(),
            records = dataset.len(),
            dropped = stats.rows_dropped,
            "query ingested"
        );
        Ok(dataset)
    }
}

/// Drives a database future on a private current-thread runtime. Expiry of
/// `limit` is reported as [`DataSourceError::Timeout`].
fn block_on_with_timeout<F, T>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime
        .block_on(async { tokio::time::timeout(limit, fut).await })
        .map_err(|_| DataSourceError::Timeout(limit))?
}

fn raw_row(row: &SqliteRow) -> RawRow {
    RawRow {
        period: column_value(row, COL_PERIOD),
        service_code: column_value(row, COL_SERVICE_CODE),
        service_name: column_value(row, COL_SERVICE_NAME),
        total_amount: column_value(row, COL_TOTAL_AMOUNT),
        status: column_value(row, COL_STATUS),
        contract_id: column_value(row, COL_CONTRACT),
    }
}

/// SQLite columns are dynamically typed, so each value is tried as text,
/// then integer, then real.
fn column_value(row: &SqliteRow, column: &str) -> RawValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return match v {
            Some(s) if column == COL_PERIOD => parse_date_string(&s)
                .map(RawValue::Date)
                .unwrap_or_else(|| RawValue::text(s)),
            Some(s) => RawValue::text(s),
            None => RawValue::Empty,
        };
    }
    if let Ok(Some(i)) = row.try_get::<Option<i64>, _>(column) {
        return RawValue::Integer(i);
    }
    if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(column) {
        return RawValue::Number(f);
    }
    RawValue::Empty
}
