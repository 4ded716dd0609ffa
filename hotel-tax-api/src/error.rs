//! HTTP mapping for [`TaxError`] and request-level failures.
//!
//! Every error response has the body
//! `{"error": {"code", "message", "details"?}}`; `details` is the
//! field → messages map and only appears for validation failures.
//!
//! | Variant              | Status | Code                  |
//! |----------------------|--------|-----------------------|
//! | `Validation`         | 422    | `VALIDATION_ERROR`    |
//! | `NotFound`           | 404    | `NOT_FOUND`           |
//! | `Conflict`           | 409    | `CONFLICT`            |
//! | `Unauthorized`       | 401    | `UNAUTHORIZED`        |
//! | `ServiceUnavailable` | 503    | `SERVICE_UNAVAILABLE` |
//! | `Internal`           | 500    | `INTERNAL_ERROR`      |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hotel_tax_core::{TaxError, ValidationErrors};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Logged in full; the client only sees a generic message.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<TaxError> for AppError {
    fn from(err: TaxError) -> Self {
        match err {
            TaxError::Validation(errors) => Self::Validation(errors),
            TaxError::NotFound(what) => Self::NotFound(what),
            TaxError::Conflict(message) => Self::Conflict(message),
            TaxError::Transient(message) => Self::ServiceUnavailable(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::error!(error = %self, "storage unavailable"),
            _ => tracing::debug!(error = %self, status = status.as_u16(), "request failed"),
        }

        let (message, details) = match self {
            Self::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            Self::Internal(_) => ("An internal error occurred".to_string(), None),
            Self::ServiceUnavailable(_) => ("Storage is temporarily unavailable".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
