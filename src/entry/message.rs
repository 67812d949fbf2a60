use serde::{Deserialize, Serialize};

use super::Payload;

/// A notification message bound for the gateway.
///
/// `connection_id` is stamped by the connection that transmits the message,
/// so an external retry layer can correlate a later [`ErrorResponse`] back to
/// the connection (and via `identifier`, the message) that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sequence identifier, unique per service instance
    pub identifier: u32,
    /// Device token, hex-encoded
    pub token: String,
    /// Notification body
    pub payload: Payload,
    /// Absolute expiration (epoch seconds); `None` for the simple variant
    pub expiration: Option<u32>,
    /// Identifier of the connection that sent this message
    pub connection_id: Option<u32>,
}

impl Message {
    pub fn simple(identifier: u32, token: impl Into<String>, payload: Payload) -> Self {
        Self {
            identifier,
            token: token.into(),
            payload,
            expiration: None,
            connection_id: None,
        }
    }

    pub fn enhanced(
        identifier: u32,
        token: impl Into<String>,
        payload: Payload,
        expiration: u32,
    ) -> Self {
        Self {
            identifier,
            token: token.into(),
            payload,
            expiration: Some(expiration),
            connection_id: None,
        }
    }
}

/// Decoded form of the gateway's asynchronous error frame.
///
/// The wire frame carries command, status and message identifier only;
/// `connection_id` is injected by the listener that read the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub command: u8,
    pub status: u8,
    /// Identifier of the message the gateway rejected
    pub identifier: u32,
    /// Identifier of the connection the frame arrived on
    pub connection_id: u32,
}

impl ErrorResponse {
    /// Human-readable description of the gateway status code.
    pub fn status_description(&self) -> &'static str {
        match self.status {
            0 => "no errors encountered",
            1 => "processing error",
            2 => "missing device token",
            3 => "missing topic",
            4 => "missing payload",
            5 => "invalid token size",
            6 => "invalid topic size",
            7 => "invalid payload size",
            8 => "invalid token",
            10 => "shutdown",
            _ => "unknown",
        }
    }
}
