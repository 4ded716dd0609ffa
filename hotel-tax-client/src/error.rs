use hotel_tax_core::ValidationErrors;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{message}")]
    Validation {
        message: String,
        details: ValidationErrors,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network failure or a `5xx`; the call may be retried.
    #[error("Service unavailable: {0}")]
    Transient(String),

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<ValidationErrors>,
}

/// Maps a non-success response to a [`ClientError`]. Bodies that are not
/// the server's error envelope fall back to the status text.
pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> ClientError {
    let (message, details) = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.details),
        Err(_) => (String::new(), None),
    };
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => ClientError::Validation {
            message,
            details: details.unwrap_or_default(),
        },
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        s if s.is_server_error() => ClientError::Transient(message),
        s => ClientError::Status {
            status: s.as_u16(),
            message,
        },
    }
}
