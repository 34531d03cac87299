/// Unified error types for RAGent
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Local cache database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Profile or subscription row absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or auth failure against the remote store or identity provider
    #[error("Remote error: {0}")]
    Remote(String),

    /// Chat upstream answered with a non-2xx status
    #[error("Upstream returned HTTP {0}")]
    Http(u16),

    /// Chat upstream answered with an explicit error message
    #[error("{0}")]
    Upstream(String),

    /// Chat upstream answered without any usable field
    #[error("Upstream returned an empty response")]
    EmptyResponse,

    /// Empty or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid credentials or missing session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Duplicate email, request already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Text shown to the user when a failure has to be rendered instead of raised
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upstream(message) => message.clone(),
            AppError::Http(status) => {
                format!("The assistant is unavailable right now (HTTP {}).", status)
            }
            AppError::EmptyResponse => "The assistant returned an empty answer.".to_string(),
            AppError::Remote(_) => "Could not reach the assistant. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            AppError::Remote(_)
            | AppError::Http(_)
            | AppError::Upstream(_)
            | AppError::EmptyResponse => (StatusCode::BAD_GATEWAY, "UpstreamError", self.to_string()),
            AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_displays_message_verbatim() {
        let err = AppError::Upstream("bad".to_string());
        assert_eq!(err.to_string(), "bad");
        assert_eq!(err.user_message(), "bad");
    }

    #[test]
    fn test_http_error_status() {
        let err = AppError::Http(500);
        assert_eq!(err.to_string(), "Upstream returned HTTP 500");
        assert!(err.user_message().contains("500"));
    }

    #[test]
    fn test_status_mapping() {
        let resp = AppError::Validation("empty".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Authentication("no session".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = AppError::Http(503).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
