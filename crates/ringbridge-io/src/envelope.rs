//! Routing envelope carried inside every frame and datagram payload.
//!
//! ```text
//! ┌────────────────────┬────────────────────────┐
//! │ Stream id (16B)    │ Body (opaque)          │
//! └────────────────────┴────────────────────────┘
//! ```

use crate::error::{IoError, Result};
use crate::stream_id::StreamId;

/// Bytes taken by the stream id prefix.
pub const ENVELOPE_HEADER_SIZE: usize = StreamId::LEN;

/// Append `stream_id ++ body` to `dst`.
pub fn encode_envelope(stream_id: &StreamId, body: &[u8], dst: &mut Vec<u8>) {
    dst.reserve(ENVELOPE_HEADER_SIZE + body.len());
    dst.extend_from_slice(stream_id.as_bytes());
    dst.extend_from_slice(body);
}

/// Split a raw message into its stream id and body.
pub fn split_envelope(raw: &[u8]) -> Result<(StreamId, &[u8])> {
    let stream_id = StreamId::from_prefix(raw).ok_or_else(|| {
        IoError::Malformed(format!(
            "message of {} bytes is shorter than the {ENVELOPE_HEADER_SIZE}-byte stream id",
            raw.len()
        ))
    })?;
    Ok((stream_id, &raw[ENVELOPE_HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_recovers_id_and_body() {
        let id = StreamId::from_bytes([9; 16]);
        let mut raw = Vec::new();
        encode_envelope(&id, b"body", &mut raw);

        assert_eq!(raw.len(), ENVELOPE_HEADER_SIZE + 4);
        let (parsed, body) = split_envelope(&raw).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(body, b"body");
    }

    #[test]
    fn empty_body_is_valid() {
        let raw = [0u8; ENVELOPE_HEADER_SIZE];
        let (id, body) = split_envelope(&raw).unwrap();
        assert_eq!(id, StreamId::nil());
        assert!(body.is_empty());
    }

    #[test]
    fn short_message_is_malformed() {
        let err = split_envelope(b"HELLO").unwrap_err();
        assert!(matches!(err, IoError::Malformed(_)));
    }
}
