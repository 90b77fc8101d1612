use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Local;
use models::{FilterCriteria, GroupKey, RankingRow, TrendRow};
use serde::Serialize;

use crate::session::{Report, ReportSession, ReportWarning};

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub user: String,
    pub source: String,
    pub group_by: GroupKey,
    pub top_n: usize,
}

#[derive(Debug, Serialize)]
pub struct ReportOutput {
    pub metadata: ReportMetadata,
    pub criteria: FilterCriteria,
    pub trend: Vec<TrendRow>,
    pub ranking: Vec<RankingRow>,
    pub warnings: Vec<String>,
}

impl ReportOutput {
    /// Wraps a report for export. Amounts are rounded to cents here and only here.
    pub fn new(session: &ReportSession, report: Report) -> Self {
        let metadata = ReportMetadata {
            generated_at: Local::now().to_rfc3339(),
            user: session.user().name().to_string(),
            source: session.source().unwrap_or_default().to_string(),
            group_by: session.group_key(),
            top_n: session.top_n(),
        };
        Self {
            metadata,
            criteria: report.criteria,
            trend: report.trend.iter().map(TrendRow::rounded).collect(),
            ranking: report.ranking.iter().map(RankingRow::rounded).collect(),
            warnings: report.warnings.iter().map(ReportWarning::to_string).collect(),
        }
    }
}

pub fn write_report_json(output: &ReportOutput, out_path: &Path, pretty: bool) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let json = if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };
    fs::write(out_path, json).with_context(|| format!("writing {}", out_path.display()))?;
    Ok(())
}
