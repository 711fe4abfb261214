//! Error types shared by every service client.

use thiserror::Error;

/// Errors that can occur while configuring a service or talking to it.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Invalid or incomplete configuration supplied by the caller
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials could not be obtained or were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-success HTTP status returned by a service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error frame reported by the recognition service
    #[error("Recognition error: {0}")]
    Recognition(String),

    /// The service closed the recognition because no speech arrived in time
    #[error("Inactivity timeout: {0}")]
    InactivityTimeout(String),

    /// Audio was pushed after the feed was stopped and drained
    #[error("Audio feed is closed")]
    AudioFeedClosed,

    /// Reading from an audio source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        SdkError::Http(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SdkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SdkError::WebSocket(err.to_string())
    }
}

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;
