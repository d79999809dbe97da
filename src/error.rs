//! Error types for the parse gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backends::BackendError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend {backend} call failed: {message}")]
    BackendCallFailed { backend: String, message: String },

    #[error("Backend {backend} is unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::CallFailed { backend, message } => {
                AppError::BackendCallFailed { backend, message }
            }
            BackendError::Unsupported { backend, operation } => AppError::NotFound(format!(
                "{} does not support {}",
                backend, operation
            )),
            BackendError::Io(e) => AppError::Io(e),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parser: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BackendCallFailed { .. }
            | AppError::Unexpected(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::BackendCallFailed { .. } => "backend_call_failed",
            AppError::BackendUnavailable { .. } => "backend_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::Unexpected(_) | AppError::Io(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, parser) = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::BackendCallFailed { backend, .. }
            | AppError::BackendUnavailable { backend, .. } => {
                tracing::error!(backend = %backend, "{}", self);
                (self.to_string(), Some(backend.clone()))
            }
            AppError::Unexpected(_) | AppError::Io(_) => {
                tracing::error!("Unexpected error: {}", self);
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            status: "error",
            error: self.code(),
            message,
            parser,
        });

        (status, body).into_response()
    }
}
