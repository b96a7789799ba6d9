use thiserror::Error;

use certanchor_ledger::LedgerError;
use certanchor_store::StoreError;
use certanchor_types::{CertificateId, LedgerStatus};

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("ledger service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("certificate not found: {0}")]
    NotFound(String),

    #[error("certificate {id} is {status}")]
    InvalidState {
        id: CertificateId,
        status: LedgerStatus,
    },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("batch task failed: {0}")]
    TaskFailed(String),
}

impl From<StoreError> for IssuanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
