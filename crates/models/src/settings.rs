use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{GroupKey, TOP_N_DEFAULT};

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

// Settings models
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    pub source: SourceSettings,
    #[serde(default)]
    pub users: BTreeMap<String, UserCredential>,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub group_by: Option<GroupKey>,
}

impl ReportSettings {
    pub fn top_n(&self) -> usize {
        self.top_n.unwrap_or(TOP_N_DEFAULT)
    }

    /// Ranking key: explicit setting, else service name for the joined
    /// database source and service code for uploaded files.
    pub fn group_key(&self) -> GroupKey {
        self.group_by.unwrap_or(match self.source {
            SourceSettings::File { .. } => GroupKey::ServiceCode,
            SourceSettings::Query(_) => GroupKey::ServiceName,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSettings {
    File { path: PathBuf },
    Query(QuerySettings),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    pub database_url: String,
    #[serde(default = "default_billing_table")]
    pub billing_table: String,
    #[serde(default = "default_service_table")]
    pub service_table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_billing_table() -> String {
    "facturacion".to_string()
}

fn default_service_table() -> String {
    "servicios".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

/// Either a plain password (dictionary lookup) or a hex SHA-256 digest of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserCredential {
    Plain { password: String },
    Sha256 { sha256: String },
}
