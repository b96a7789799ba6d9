use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("certificate not found: {0}")]
    NotFound(String),

    #[error("duplicate certificate id: {0}")]
    Duplicate(String),

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
