//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failed or dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out waiting for the server
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid message or payload
    #[error("Invalid message: {0}")]
    Invalid(String),

    /// Sound playback failed
    #[error("Sound error: {0}")]
    Sound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
