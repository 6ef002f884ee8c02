//! # Application Errors
//!
//! `AppError` wraps engine errors together with the failures that only the
//! binary can hit (configuration, file I/O, JSON payloads), and maps each
//! one to an HTTP status for the API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use graphstage_core::StageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the CLI and the HTTP server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Error from the staging engine or a storage provider.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request or script rejected before reaching the engine.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File or socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON payload.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Create a bad request error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Stage(StageError::NotSynced) => StatusCode::CONFLICT,
            Self::Stage(StageError::Unsupported(_)) => StatusCode::NOT_IMPLEMENTED,
            Self::Stage(StageError::GraphNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Stage(StageError::InvalidInput(_)) | Self::BadRequest(_) | Self::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Stage(_) | Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stage(StageError::NotSynced) => "not_synced",
            Self::Stage(StageError::Unsupported(_)) => "unsupported",
            Self::Stage(StageError::GraphNotFound(_)) => "graph_not_found",
            Self::Stage(StageError::BackendFailure(_)) => "backend_failure",
            Self::Stage(StageError::InvalidInput(_)) | Self::BadRequest(_) => "invalid_input",
            Self::Json(_) => "invalid_json",
            Self::Stage(_) | Self::Config(_) | Self::Io(_) => "internal",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
