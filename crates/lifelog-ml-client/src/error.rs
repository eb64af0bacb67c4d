//! Summarization client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    /// Transient upstream failure. Retry with backoff.
    #[error("Summarization service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Permanent failure for this content (policy, auth, bad request).
    /// Do not retry verbatim; surface to the operator.
    #[error("Summarization service rejected request: {0}")]
    ServiceRejected(String),

    /// The request could not be built (e.g. members out of order).
    #[error("Invalid summarization request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ServiceRejected(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify a non-success HTTP status.
    ///
    /// 408, 429 and 5xx are transient; every other status is a rejection.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let msg = format!("HTTP {}: {}", status, body);
        match status {
            408 | 429 | 500..=599 => Self::ServiceUnavailable(msg),
            _ => Self::ServiceRejected(msg),
        }
    }

    /// Check if the same request may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MlError::ServiceUnavailable(_)
                | MlError::Timeout(_)
                | MlError::Network(_)
                | MlError::InvalidResponse(_)
        )
    }

    /// Check if the failure is permanent for this content.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            MlError::ServiceRejected(_) | MlError::InvalidRequest(_) | MlError::Config(_)
        )
    }
}
