//! Error types for the mock API.
//!
//! [`ApiError`] implements [`axum::response::IntoResponse`] so handlers can
//! return `Result<…, ApiError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use expensa_models::ModelError;

/// Errors a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, unknown or expired token, or bad credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role set does not allow the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource is not in a state that allows the action.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The payload failed validation.
    #[error("invalid request: {0}")]
    Validation(#[from] ModelError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        tracing::warn!(%status, error = %message, "request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Validation(ModelError::AllocationSum { total: 10.0 }).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn validation_message_is_forwarded() {
        let err = ApiError::from(ModelError::AllocationSum { total: 90.0 });
        assert_eq!(
            err.to_string(),
            "invalid request: segment allocations must sum to 100%, current sum: 90%"
        );
    }
}
