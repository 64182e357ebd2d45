//! # API Error Types
//!
//! [`AppError`] maps engine errors to HTTP status codes and a JSON body:
//!
//! ```json
//! { "error": { "code": "NOT_FOUND", "message": "activation key \"1-x\" not found" } }
//! ```
//!
//! Internal error messages are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use akm_core::ValidationError;
use akm_state::PolicyError;

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// The error.
    pub error: ErrorDetail,
}

/// Error code, message and optional details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra context for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application error returned by handlers.
#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// 422. Input was well-formed but violates a rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// 400. Body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// 500. The message is logged only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and machine-readable code.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        match &err {
            PolicyError::NotFound { .. } => Self::NotFound(err.to_string()),
            PolicyError::Validator(_)
            | PolicyError::InvalidChannel { .. }
            | PolicyError::InvalidEntitlement(_)
            | PolicyError::MissingEntitlement { .. } => {
                tracing::warn!(error = %err, "request rejected");
                Self::Validation(err.to_string())
            }
            PolicyError::DuplicateKey(_) | PolicyError::UsageLimitExceeded { .. } => {
                Self::Conflict(err.to_string())
            }
            PolicyError::PermissionDenied { .. } => Self::Forbidden(err.to_string()),
        }
    }
}
