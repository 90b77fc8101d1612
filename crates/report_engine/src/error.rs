use billing_ingest::DataSourceError;
use thiserror::Error;

use crate::auth::AuthenticationFailure;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationFailure),

    #[error("No dataset loaded")]
    NoDataset,
}
