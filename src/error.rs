//! Error types for the REST API.
//!
//! Domain errors convert into [`ApiError`], which maps each failure class to a
//! status code and the uniform `{success, message, error}` envelope. Server-side
//! failures are logged here and reach the caller only as a generic message.

use crate::auth::AuthError;
use crate::market::PricingError;
use crate::orders::OrderError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;


/// API error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// User-safe error message.
    pub message: String,
    /// Error code.
    pub error: String,
}

/// API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing, invalid, expired or wrong-role credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// Quote provider unavailable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Status code and envelope error code.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_UNAVAILABLE"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message shown to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(_) => "Market data is currently unavailable".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("{} ({})", self, code);
        }

        let body = Json(ErrorResponse {
            success: false,
            message: self.public_message(),
            error: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidSide(_) | PricingError::InvalidSymbol(_) => {
                ApiError::InvalidRequest(err.to_string())
            }
            PricingError::QuoteUnavailable { .. } | PricingError::InvalidQuote { .. } => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidSide(_) | OrderError::InvalidVolume(_) => {
                ApiError::InvalidRequest(err.to_string())
            }
            OrderError::Pricing(e) => e.into(),
            OrderError::PersistenceFailed { .. } => ApiError::Database(err.to_string()),
            OrderError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::InvalidRequest(msg),
            AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized,
            AuthError::Store(_) => ApiError::Database(err.to_string()),
            AuthError::Token(_) | AuthError::Hashing(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::InvalidRequest(format!("Failed to bind JSON request: {}", err.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::InvalidRequest(format!("Invalid path parameter: {}", err.body_text()))
    }
}
