//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its
//! mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use cellar_core::ports::PortError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps the error taxonomy onto HTTP statuses and JSON bodies.
///
/// `Unauthorized` is always 401 and never retried; `NotFound` and
/// `Validation` are terminal 404/400; extraction failures surface as a
/// retryable 500; everything else is logged and hidden behind a generic
/// message. No error here is fatal to the process.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Port(PortError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ApiError::Port(PortError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Port(PortError::Validation(details)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation error", "details": details })),
            )
                .into_response(),
            ApiError::Port(PortError::Extraction(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Wine scan failed: {}", msg) })),
            )
                .into_response(),
            other => {
                error!("Internal error while handling request: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
