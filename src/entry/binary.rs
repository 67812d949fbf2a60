use crate::error::{ApnsError, Result};

use super::{ErrorResponse, Message, NotificationCodec, ERROR_RESPONSE_LEN};

/// Wire command for a simple notification frame.
const COMMAND_SIMPLE: u8 = 0;
/// Wire command for an enhanced notification frame.
const COMMAND_ENHANCED: u8 = 1;
/// Wire command of the gateway's error frame.
const COMMAND_ERROR: u8 = 8;

/// Maximum serialized payload size accepted by the gateway.
const PAYLOAD_MAX_LEN: usize = 256;

/// The legacy APNs binary wire format.
///
/// Simple frame: command, token length (u16), token, payload length (u16),
/// payload. Enhanced frame additionally carries the message identifier and
/// expiration between command and token. All integers are big-endian; the
/// device token travels as raw bytes decoded from its hex form.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl NotificationCodec for BinaryCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        let token = decode_hex(&message.token)?;
        let payload = serde_json::to_vec(&message.payload)
            .map_err(|e| ApnsError::Codec(format!("payload serialization failed: {e}")))?;
        if payload.len() > PAYLOAD_MAX_LEN {
            return Err(ApnsError::Codec(format!(
                "payload is {} bytes, gateway limit is {PAYLOAD_MAX_LEN}",
                payload.len()
            )));
        }

        let mut frame = Vec::with_capacity(11 + token.len() + payload.len());
        match message.expiration {
            None => frame.push(COMMAND_SIMPLE),
            Some(expiration) => {
                frame.push(COMMAND_ENHANCED);
                frame.extend_from_slice(&message.identifier.to_be_bytes());
                frame.extend_from_slice(&expiration.to_be_bytes());
            }
        }
        frame.extend_from_slice(&(token.len() as u16).to_be_bytes());
        frame.extend_from_slice(&token);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn decode_error_frame(&self, frame: &[u8; ERROR_RESPONSE_LEN]) -> Result<ErrorResponse> {
        let command = frame[0];
        if command != COMMAND_ERROR {
            return Err(ApnsError::Codec(format!(
                "unexpected error frame command: {command}"
            )));
        }
        let identifier = u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]);
        Ok(ErrorResponse {
            command,
            status: frame[1],
            identifier,
            connection_id: 0,
        })
    }
}

fn decode_hex(token: &str) -> Result<Vec<u8>> {
    let bytes = token.as_bytes();
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return Err(ApnsError::Codec(format!(
            "device token has invalid length: {}",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(2)
        .map(|pair| Ok(hex_value(pair[0])? << 4 | hex_value(pair[1])?))
        .collect()
}

fn hex_value(byte: u8) -> Result<u8> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(ApnsError::Codec(
            "device token is not valid hex".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Aps, Payload};
    use serde_json::json;

    fn test_payload() -> Payload {
        Payload::new(Aps {
            alert: Some("hi".to_string()),
            badge: None,
            sound: None,
        })
    }

    #[test]
    fn test_simple_frame_layout() {
        let message = Message::simple(1, "0a0b", test_payload());
        let frame = BinaryCodec.encode(&message).unwrap();

        assert_eq!(frame[0], COMMAND_SIMPLE);
        assert_eq!(u16::from_be_bytes([frame[1], frame[2]]), 2);
        assert_eq!(&frame[3..5], &[0x0a, 0x0b]);
        let payload_len = u16::from_be_bytes([frame[5], frame[6]]) as usize;
        assert_eq!(frame.len(), 7 + payload_len);
    }

    #[test]
    fn test_enhanced_frame_layout() {
        let message = Message::enhanced(0x01020304, "ff", test_payload(), 0x05060708);
        let frame = BinaryCodec.encode(&message).unwrap();

        assert_eq!(frame[0], COMMAND_ENHANCED);
        assert_eq!(&frame[1..5], &[1, 2, 3, 4]);
        assert_eq!(&frame[5..9], &[5, 6, 7, 8]);
        assert_eq!(u16::from_be_bytes([frame[9], frame[10]]), 1);
        assert_eq!(frame[11], 0xff);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut payload = test_payload();
        payload
            .try_insert_ext("blob", json!("x".repeat(300)))
            .unwrap();
        let message = Message::simple(1, "ff", payload);
        let err = BinaryCodec.encode(&message).unwrap_err();
        assert!(matches!(err, ApnsError::Codec(_)));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let message = Message::simple(1, "xyz", test_payload());
        assert!(BinaryCodec.encode(&message).is_err());

        let message = Message::simple(1, "", test_payload());
        assert!(BinaryCodec.encode(&message).is_err());
    }

    #[test]
    fn test_non_ascii_token_is_a_codec_error() {
        // "a\u{e9}9" is four bytes, so it passes the even-length check; the
        // multi-byte char must surface as a decode error, not a panic.
        let message = Message::simple(1, "a\u{e9}9", test_payload());
        let err = BinaryCodec.encode(&message).unwrap_err();
        assert!(matches!(err, ApnsError::Codec(_)));
    }

    #[test]
    fn test_decode_error_frame() {
        let frame = [COMMAND_ERROR, 8, 0, 0, 0, 42];
        let response = BinaryCodec.decode_error_frame(&frame).unwrap();
        assert_eq!(response.status, 8);
        assert_eq!(response.identifier, 42);
        assert_eq!(response.connection_id, 0);
        assert_eq!(response.status_description(), "invalid token");
    }

    #[test]
    fn test_decode_rejects_wrong_command() {
        let frame = [1, 8, 0, 0, 0, 42];
        assert!(BinaryCodec.decode_error_frame(&frame).is_err());
    }
}
