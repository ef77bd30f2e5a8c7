use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write collides with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store refused the operation (e.g. connection lost).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record could not be mapped back to a domain value.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The input failed domain validation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
