use crate::error::Result;

use super::{ErrorResponse, Message};

/// Length in bytes of the gateway's asynchronous error frame:
/// command (1) + status (1) + message identifier (4).
pub const ERROR_RESPONSE_LEN: usize = 6;

/// Seam between the connection and the wire format.
///
/// Encoding must produce the complete frame for one message; decoding
/// consumes exactly one error frame. Implementations must not perform I/O.
pub trait NotificationCodec: Send + Sync {
    /// Encode a message into its wire frame.
    fn encode(&self, message: &Message) -> Result<Vec<u8>>;

    /// Decode a full error frame. The returned response carries
    /// `connection_id = 0`; the listener stamps the real value.
    fn decode_error_frame(&self, frame: &[u8; ERROR_RESPONSE_LEN]) -> Result<ErrorResponse>;
}
