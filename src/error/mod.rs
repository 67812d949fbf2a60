use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApnsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Nested payload body not permitted for extension key '{0}'")]
    NestedPayload(String),

    #[error("Feedback limit {0} exceeds maximum of 100")]
    FeedbackLimit(usize),

    #[error("Invalid push variant: {0}")]
    InvalidVariant(u8),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Handshake not completed within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Dial timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApnsError>;
