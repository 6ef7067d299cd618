// Error types for the authenticated request pipeline

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by [`crate::pipeline::Pipeline`] and the API wrappers built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, broken body stream).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered 401 and there was no refresh token to recover with.
    #[error("Authentication expired (HTTP 401): {body}")]
    AuthExpired { body: String },

    /// The refresh attempt itself failed.
    ///
    /// The stored session has been cleared; the user must log in again.
    #[error("Authentication failed, please log in again: {reason}")]
    AuthFailed { reason: String },

    /// Any other non-success HTTP status. The body is the backend payload, unmodified.
    #[error("Backend error (HTTP {status}): {body}")]
    Backend { status: StatusCode, body: String },

    /// A success response whose body was not the expected JSON.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The session store could not be read or written.
    #[error("Session store error: {0}")]
    Session(String),
}

impl ApiError {
    /// Returns true if the caller should send the user back to a login surface.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::AuthFailed { .. } | ApiError::AuthExpired { .. })
    }

    /// Returns the HTTP status for errors that carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the backend payload attached to this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::AuthExpired { body } | ApiError::Backend { body, .. } => Some(body),
            _ => None,
        }
    }
}
