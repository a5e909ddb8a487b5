//! Error types for curriculum service calls

use thiserror::Error;

/// Errors that can occur when talking to the curriculum service
#[derive(Debug, Error)]
pub enum ApiError {
    /// No access token stored
    #[error("Access token not configured. Run `syllabus login <token>`")]
    TokenNotFound,

    /// Failed to access system keyring
    #[error("Failed to access keyring: {0}")]
    KeyringError(String),

    /// Token rejected before it was ever sent
    #[error("Invalid access token format")]
    InvalidToken,

    /// Configured base URL cannot have paths appended
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Credential rejected by the service; the session layer owns recovery
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the service
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_seconds: u64,
    },

    /// Service returned an error response
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if this error is transient (a later retry may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::RequestError(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error requires a new credential
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::TokenNotFound | ApiError::InvalidToken | ApiError::Unauthorized)
    }
}
