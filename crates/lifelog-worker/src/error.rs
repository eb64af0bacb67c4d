//! Worker error types.

use thiserror::Error;

use lifelog_ml_client::MlError;
use lifelog_models::LevelError;
use lifelog_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Throttle closed: {0}")]
    ThrottleClosed(String),

    #[error("Summarization error: {0}")]
    Summarization(#[from] MlError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Level chain error: {0}")]
    Level(#[from] LevelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn export_failed(msg: impl Into<String>) -> Self {
        Self::ExportFailed(msg.into())
    }

    /// Check if error is retryable at the granularity of one bucket.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Summarization(e) => e.is_retryable(),
            WorkerError::Storage(e) => !e.is_not_found() && matches!(
                e,
                StorageError::Io(_) | StorageError::ReadFailed(_) | StorageError::WriteFailed(_)
            ),
            WorkerError::Io(_) => true,
            _ => false,
        }
    }

    /// Input store does not exist yet: skip, do not fail.
    pub fn is_store_not_found(&self) -> bool {
        matches!(self, WorkerError::Storage(e) if e.is_not_found())
    }

    /// Upstream refused this content; needs operator attention.
    pub fn is_rejected(&self) -> bool {
        matches!(self, WorkerError::Summarization(e) if e.is_rejected())
    }
}
