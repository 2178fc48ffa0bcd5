use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Non-2xx response. `body` holds the raw response bytes.
    #[error("API error (status {status}): {}", String::from_utf8_lossy(.body))]
    ApiError { status: u16, body: Vec<u8> },

    #[error("Decode error: {0}")]
    DecodeError(String),

    /// A combined-stream name or user-data event that no decoder is registered for.
    #[error("Unknown stream type: {0}")]
    UnknownStreamType(String),

    #[error("Stream connection closed")]
    ConnectionClosed,

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketError(Box::new(err))
    }
}

/// Structured error body returned by the REST API, e.g. `{"code":-1003,"msg":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

impl ExchangeError {
    /// Parse the body of an `ApiError` as the exchange's `{code, msg}` shape.
    ///
    /// Returns `None` for every other variant or when the body is not that shape.
    pub fn api_error_body(&self) -> Option<ApiErrorBody> {
        match self {
            Self::ApiError { body, .. } => serde_json::from_slice(body).ok(),
            _ => None,
        }
    }

    /// HTTP status of an `ApiError`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Prefix a `DecodeError` message with where it happened, e.g. `bids[2] price`.
    ///
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::DecodeError(msg) => Self::DecodeError(format!("{}: {}", context, msg)),
            other => other,
        }
    }

    /// True for errors after which a stream connection yields nothing further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::WebSocketError(_))
    }
}
