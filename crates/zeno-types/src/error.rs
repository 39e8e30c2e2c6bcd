use thiserror::Error;

/// Errors from repository operations (used by trait definitions in zeno-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to routing policy reads and replacement.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid routing policy: {0}")]
    Invalid(String),

    #[error("policy storage error: {0}")]
    Repository(#[from] RepositoryError),
}
