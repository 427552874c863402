use common::ObjectClass;
use thiserror::Error;

/// Errors that can occur when interacting with a count repository.
#[derive(Debug, Error)]
pub enum CountStoreError {
    /// The requested object class has no stored count.
    #[error("Object class not found: {0}")]
    NotFound(ObjectClass),

    /// The batch or a stored value cannot be represented by the backend.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend is unreachable or refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A relational database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A document store error occurred.
    #[error("Document store error: {0}")]
    Document(#[from] mongodb::error::Error),
}

impl CountStoreError {
    /// Returns true for connection and transaction failures that a caller
    /// may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CountStoreError::Unavailable(_)
                | CountStoreError::Database(_)
                | CountStoreError::Document(_)
        )
    }
}

/// Result type for count repository operations.
pub type Result<T> = std::result::Result<T, CountStoreError>;
