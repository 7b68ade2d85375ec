//! Error types for the trading client.

use thiserror::Error;

#[cfg(test)]
mod tests;

/// Client error types.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Query string could not be encoded.
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] serde_urlencoded::ser::Error),

    /// API returned an error envelope.
    #[error("API error ({status}, {code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Envelope error code, e.g. `INVALID_REQUEST`.
        code: String,
        /// Error message from API.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, invalid or expired token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A protected endpoint was called without a token.
    #[error("No access token configured")]
    MissingToken,

    /// Success envelope without a payload.
    #[error("Response carried no data: {0}")]
    EmptyResponse(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// HTTP status of a server-reported error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Unauthorized(_) => Some(401),
            _ => None,
        }
    }
}
