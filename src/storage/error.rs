//! Errors raised by document stores

use std::time::Duration;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached
    #[error("could not reach document store: {0}")]
    ConnectionFailed(String),

    /// The store did not answer within the connect timeout
    #[error("document store did not answer within {0:?}")]
    Timeout(Duration),

    /// A read or write was refused
    #[error("document store rejected the operation: {0}")]
    QueryFailed(String),

    #[error("schema migration failed: {0}")]
    MigrationFailed(String),

    #[error("invalid document store configuration: {0}")]
    InvalidConfig(String),

    /// A document could not be encoded or decoded as JSON
    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted after `close`
    #[error("document store is closed")]
    Closed,
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Io(io_err),
            sqlx::Error::PoolClosed => StorageError::Closed,
            sqlx::Error::PoolTimedOut => {
                StorageError::ConnectionFailed("no connection available".to_string())
            }
            other => StorageError::QueryFailed(other.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}
