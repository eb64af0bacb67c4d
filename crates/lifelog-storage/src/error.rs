//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store (folder) does not exist yet. Callers treat this as
    /// "nothing to do" rather than a failure.
    #[error("Store not found: {0}")]
    NotFound(String),

    #[error("Invalid store id: {0}")]
    InvalidStoreId(String),

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(store: impl Into<String>) -> Self {
        Self::NotFound(store.into())
    }

    pub fn invalid_store_id(msg: impl Into<String>) -> Self {
        Self::InvalidStoreId(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// True for a missing store, which is a skip rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
