//! SDK error types.
//!
//! [`SdkError`] is the single error type returned by every fallible
//! operation in the SDK.  It wraps transport, HTTP-status, serialization
//! and session failures into a unified enum that callers can branch on.

use reqwest::StatusCode;

/// Error type for all SDK operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid or missing configuration (e.g. bad URL, missing field).
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication precondition not met (e.g. no refresh token stored).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: StatusCode,
        /// Raw response body, kept for page-level error banners.
        body: String,
    },

    /// The stored credentials could not be renewed.
    ///
    /// The session store has already been cleared; the application shell
    /// decides where to send the user (typically the login entry point).
    /// `source` is the refresh failure, not the original 401.
    #[error("session expired: {source}")]
    SessionExpired {
        /// Why the refresh exchange failed.
        #[source]
        source: Box<SdkError>,
    },

    /// Transport failure (connection refused, TLS, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization / deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client-side validation rejected the payload before sending.
    #[error("validation error: {0}")]
    Validation(#[from] expensa_models::ModelError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// The HTTP status carried by a [`SdkError::Status`], if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 401 response that was not (or no longer) recoverable.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// True when the session was torn down and the user must log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    pub(crate) fn session_expired(source: SdkError) -> Self {
        Self::SessionExpired {
            source: Box::new(source),
        }
    }
}
