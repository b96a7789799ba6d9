//! Parse errors for the shared types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("invalid ledger address: {0}")]
    InvalidAddress(String),

    #[error("invalid ledger reference: {0}")]
    InvalidReference(String),

    #[error("unknown ledger status: {0}")]
    UnknownStatus(String),

    #[error("unknown batch mode: {0}")]
    UnknownMode(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
