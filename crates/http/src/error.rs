//! HTTP error types and implementations

#[cfg(feature = "server")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portal_core::FieldErrors;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP-specific errors raised by the edge routes
#[derive(Error, Debug)]
pub enum HttpError {
    /// Authentication failed
    #[error("{0}")]
    AuthenticationFailed(String),

    /// Request rejected by the origin check
    #[error("{0}")]
    Forbidden(String),

    /// Bad request
    #[error("{0}")]
    BadRequest(String),

    /// Identity API rejected the payload
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        errors: Option<FieldErrors>,
    },

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(feature = "server")]
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::AuthenticationFailed(_) => (StatusCode::UNAUTHORIZED, "authentication_failed"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Upstream { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_error",
            ),
            Self::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_server_error")
            }
        };

        let details = match &self {
            Self::Upstream {
                errors: Some(errors),
                ..
            } => serde_json::to_value(errors).ok(),
            _ => None,
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(feature = "client")]
impl From<crate::client::error::ClientError> for HttpError {
    fn from(err: crate::client::error::ClientError) -> Self {
        use crate::client::error::ClientError;

        match err {
            ClientError::AuthenticationFailed(message) => Self::AuthenticationFailed(message),
            ClientError::Request(_) | ClientError::Configuration(_) => {
                Self::InternalServerError(err.to_string())
            }
            other => Self::Upstream {
                status: other.status().unwrap_or(502),
                message: other.user_message().unwrap_or_else(|| other.to_string()),
                errors: other.validation_errors().cloned(),
            },
        }
    }
}

/// Result type alias using HttpError
pub type Result<T> = std::result::Result<T, HttpError>;
