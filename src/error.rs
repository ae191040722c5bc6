//! Error types for the flow bridge

use hyper::StatusCode;
use thiserror::Error;

/// Errors that can occur while serving Flow traffic
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Area lookup error: {0}")]
    Lookup(String),

    #[error("Messaging API error: {0}")]
    Messaging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// HTTP status reported to the caller for this error.
    ///
    /// Only configuration and request-shape problems are surfaced as 400.
    /// Crypto failures collapse into a bare 500 regardless of which step
    /// rejected the envelope.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Config(_) | BridgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
