//! Error types for stemgate
//!
//! One enum covers the whole taxonomy: client-side rejections, the
//! duplicate-in-flight conflict, record state-machine violations, and the
//! collaborator failure modes (storage, compute transport/timeout, backend
//! non-success). The HTTP mapping lives here so handlers can return
//! `Result<Json<T>>` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type used throughout stemgate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied parameter outside the allowed set (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another request holds the processing slot for this content key (409)
    #[error("Duplicate request: {0}")]
    DuplicateRecord(String),

    /// State mutation attempted on a record that is not `processing`.
    /// A caller-side logic bug, never a user condition.
    #[error("Invalid record transition: {0}")]
    InvalidTransition(String),

    /// Staging the input with object storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Compute backend call did not complete within the timeout window
    #[error("Compute backend timed out: {0}")]
    ComputeTimeout(String),

    /// Compute backend unreachable at the transport level
    #[error("Compute backend unreachable: {0}")]
    ComputeTransport(String),

    /// Compute backend reachable but reported non-success or malformed output
    #[error("Compute backend failure: {0}")]
    BackendFailure(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Error::DuplicateRecord(_) => (StatusCode::CONFLICT, "DUPLICATE_IN_FLIGHT"),
            Error::InvalidTransition(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_TRANSITION")
            }
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Error::ComputeTimeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BACKEND_TIMEOUT"),
            Error::ComputeTransport(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BACKEND_UNREACHABLE")
            }
            Error::BackendFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BACKEND_FAILURE"),
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
