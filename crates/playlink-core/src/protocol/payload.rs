//! Low-level field readers and writers shared by the payload records.
//!
//! All multi-byte integers are big-endian.  Strings are UTF-8 with a 2-byte
//! length prefix.  Readers take an offset and return the value together with
//! the offset of the next unread byte so that records can be decoded field by
//! field without an intermediate cursor type.

use uuid::Uuid;

use crate::protocol::codec::ProtocolError;

pub(crate) fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

pub(crate) fn read_u8(buf: &[u8], offset: usize, context: &str) -> Result<(u8, usize), ProtocolError> {
    require_len(buf, offset + 1, context)?;
    Ok((buf[offset], offset + 1))
}

pub(crate) fn read_bool(buf: &[u8], offset: usize, context: &str) -> Result<(bool, usize), ProtocolError> {
    let (b, next) = read_u8(buf, offset, context)?;
    Ok((b != 0, next))
}

pub(crate) fn read_u16(buf: &[u8], offset: usize, context: &str) -> Result<(u16, usize), ProtocolError> {
    require_len(buf, offset + 2, context)?;
    Ok((u16::from_be_bytes([buf[offset], buf[offset + 1]]), offset + 2))
}

pub(crate) fn read_i16(buf: &[u8], offset: usize, context: &str) -> Result<(i16, usize), ProtocolError> {
    require_len(buf, offset + 2, context)?;
    Ok((i16::from_be_bytes([buf[offset], buf[offset + 1]]), offset + 2))
}

pub(crate) fn read_u32(buf: &[u8], offset: usize, context: &str) -> Result<(u32, usize), ProtocolError> {
    require_len(buf, offset + 4, context)?;
    Ok((
        u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]),
        offset + 4,
    ))
}

pub(crate) fn read_uuid(buf: &[u8], offset: usize, context: &str) -> Result<(Uuid, usize), ProtocolError> {
    require_len(buf, offset + 16, context)?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    Ok((Uuid::from_bytes(bytes), offset + 16))
}

pub(crate) fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(if value { 0x01 } else { 0x00 });
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
///
/// Strings longer than `u16::MAX` bytes are truncated at the last character
/// boundary that fits.
pub(crate) fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) {
    let mut len = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    buf.extend_from_slice(&(len as u16).to_be_bytes());
    buf.extend_from_slice(&s.as_bytes()[..len]);
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after the string.
pub(crate) fn read_length_prefixed_string(
    buf: &[u8],
    offset: usize,
    context: &str,
) -> Result<(String, usize), ProtocolError> {
    let (len, start) = read_u16(buf, offset, context)?;
    let end = start + len as usize;
    if buf.len() < end {
        return Err(ProtocolError::MalformedPayload(format!(
            "{context}: string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..end])
        .map_err(|e| ProtocolError::MalformedPayload(format!("{context}: invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, end))
}
