//! Wire-level types for the APNs binary protocol.
//!
//! This module defines the notification message, the notification payload,
//! the asynchronous error-response frame, and the feedback record, together
//! with the [`NotificationCodec`] seam that turns messages into wire bytes.
//! [`BinaryCodec`] implements the legacy binary format.

mod binary;
mod codec;
mod feedback;
mod message;
mod payload;

pub use binary::BinaryCodec;
pub use codec::{NotificationCodec, ERROR_RESPONSE_LEN};
pub use feedback::Feedback;
pub use message::{ErrorResponse, Message};
pub use payload::{Aps, Payload};
