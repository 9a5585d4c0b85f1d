//! Error types for the service layers and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failures of a completion round-trip or of interpreting its output.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("invalid API key")]
    Unauthorized,

    #[error("no access to model {0}")]
    Forbidden(String),

    #[error("model {0} does not exist")]
    ModelNotFound(String),

    #[error("API request timeout after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("unsupported analysis mode: {0}")]
    UnsupportedMode(String),
}

impl LlmError {
    /// Errors the provider retries before giving up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::RequestFailed(_) | LlmError::MalformedResponse(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("post content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    RateLimited { per_minute: u32 },
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RateLimited { per_minute } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": format!("Rate limit exceeded: {per_minute} per 1 minute"),
                })),
            )
                .into_response(),
            ApiError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": detail })),
            )
                .into_response(),
        }
    }
}
