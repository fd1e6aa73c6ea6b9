//! Frame codec for putting [`Message`]s on a byte stream.
//!
//! Wire format:
//! ```text
//! [version:1][reserved:1][id:2][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. All multi-byte integers are big-endian.
//!
//! Stream readers usually read exactly [`HEADER_SIZE`] bytes, call
//! [`decode_header`] to learn the payload length, then read the payload.
//! Buffer-oriented callers can use [`decode_frame`] directly.

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{Message, MessageId, HEADER_SIZE, MAX_PAYLOAD_LEN, PROTOCOL_VERSION};

/// Errors that can occur during frame or payload encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload exceeds [`MAX_PAYLOAD_LEN`].
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The payload could not be parsed (field value out of range, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// The decoded 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub id: MessageId,
    pub payload_len: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into a byte vector including the 8-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
/// [`MAX_PAYLOAD_LEN`].
///
/// # Examples
///
/// ```rust
/// use playlink_core::{decode_frame, encode_frame, Message, MessageId};
///
/// let msg = Message::new(MessageId::SERVER_DOWN, Vec::new());
/// let bytes = encode_frame(&msg).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let len = msg.payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + len);
    buf.push(PROTOCOL_VERSION);
    buf.push(0x00); // reserved
    buf.extend_from_slice(&msg.id.0.to_be_bytes());
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    buf.extend_from_slice(&msg.payload);
    Ok(buf)
}

/// Decodes the 8-byte header at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if fewer than [`HEADER_SIZE`] bytes are given,
/// the version is unsupported, or the declared payload length is over the limit.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    // bytes[1] is reserved – ignored on decode
    let id = MessageId(u16::from_be_bytes([bytes[2], bytes[3]]));
    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    Ok(FrameHeader {
        version,
        id,
        payload_len,
    })
}

/// Decodes one [`Message`] from the beginning of `bytes`.
///
/// Returns the message and the total number of bytes consumed (header +
/// payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when `bytes` does not yet hold
/// a complete frame; callers buffering a stream should read more and retry.
pub fn decode_frame(bytes: &[u8]) -> Result<(Message, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let total = HEADER_SIZE + header.payload_len;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    trace!(id = %header.id, len = header.payload_len, "decoded frame");
    let payload = bytes[HEADER_SIZE..total].to_vec();
    Ok((Message::new(header.id, payload), total))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_header_layout() {
        // Arrange
        let msg = Message::new(MessageId::PLAYER_STATUS, vec![0x02, 0x32, 0x00, 0x01]);

        // Act
        let bytes = encode_frame(&msg).unwrap();

        // Assert
        assert_eq!(&bytes[..HEADER_SIZE], &[0x01, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(&bytes[HEADER_SIZE..], &[0x02, 0x32, 0x00, 0x01]);
    }

    #[test]
    fn test_decode_frame_consumes_only_first_frame() {
        // Arrange – two frames back to back
        let first = Message::new(MessageId::PLAYER_INFO, vec![9, 8, 7]);
        let second = Message::new(MessageId::SERVER_DOWN, Vec::new());
        let mut bytes = encode_frame(&first).unwrap();
        bytes.extend(encode_frame(&second).unwrap());

        // Act
        let (decoded, consumed) = decode_frame(&bytes).unwrap();
        let (rest, _) = decode_frame(&bytes[consumed..]).unwrap();

        // Assert
        assert_eq!(decoded, first);
        assert_eq!(consumed, HEADER_SIZE + 3);
        assert_eq!(rest, second);
    }

    #[test]
    fn test_decode_header_too_short_is_insufficient_data() {
        let err = decode_header(&[0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 3
            }
        );
    }

    #[test]
    fn test_decode_header_rejects_unknown_version() {
        let err = decode_header(&[0x07, 0, 0, 1, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedVersion(0x07));
    }

    #[test]
    fn test_decode_header_rejects_oversized_payload_length() {
        let len = (MAX_PAYLOAD_LEN as u32 + 1).to_be_bytes();
        let bytes = [0x01, 0x00, 0x00, 0x10, len[0], len[1], len[2], len[3]];
        assert!(matches!(
            decode_header(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_frame_with_partial_payload_requests_more_data() {
        // Arrange
        let msg = Message::new(MessageId::PLAYER_TRACK, vec![0u8; 16]);
        let bytes = encode_frame(&msg).unwrap();

        // Act
        let err = decode_frame(&bytes[..HEADER_SIZE + 4]).unwrap_err();

        // Assert
        assert_eq!(
            err,
            ProtocolError::InsufficientData {
                needed: HEADER_SIZE + 16,
                available: HEADER_SIZE + 4
            }
        );
    }

    #[test]
    fn test_encode_frame_rejects_oversized_payload() {
        let msg = Message::new(MessageId::PLAYER_TRACK, vec![0u8; MAX_PAYLOAD_LEN + 1]);
        assert!(matches!(
            encode_frame(&msg),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_reserved_byte_is_ignored_on_decode() {
        let bytes = [0x01, 0xFF, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00];
        let (msg, _) = decode_frame(&bytes).unwrap();
        assert_eq!(msg.id, MessageId::SERVER_DOWN);
    }
}
