use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Frame header: a single 2-byte little-endian payload length.
pub const HEADER_SIZE: usize = 2;

/// Default frame capacity, header included.
pub const DEFAULT_MAX_FRAME: usize = 1024;

/// Default maximum payload size: the frame capacity minus the header.
pub const DEFAULT_MAX_PAYLOAD: usize = DEFAULT_MAX_FRAME - HEADER_SIZE;

/// Largest payload the length field can describe.
pub const WIRE_MAX_PAYLOAD: usize = u16::MAX as usize;

/// What to do with bytes that arrive past the end of the declared frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailingBytes {
    /// Treat surplus bytes as a protocol violation and stop reading.
    #[default]
    Reject,
    /// Keep surplus bytes buffered as the start of the next frame.
    CarryOver,
}

/// One length-prefixed unit read off the ingress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload, opaque to the codec.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length (2B)  │ Payload          │
/// │ little-endian│ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > WIRE_MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: WIRE_MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    Ok(())
}

/// Read the declared payload length, if the header has arrived.
pub fn peek_payload_len(src: &[u8]) -> Option<usize> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    Some(usize::from(src[1]) * 256 + usize::from(src[0]))
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. The declared length
/// is checked against `max_payload` before any payload byte is looked at.
pub fn decode_frame(
    src: &mut BytesMut,
    max_payload: usize,
    trailing: TrailingBytes,
) -> Result<Option<Frame>> {
    let Some(payload_len) = peek_payload_len(src) else {
        return Ok(None); // Need more data
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    if src.len() > total && trailing == TrailingBytes::Reject {
        return Err(FrameError::TrailingBytes {
            expected: payload_len,
            received: src.len() - HEADER_SIZE,
        });
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1022.
    pub max_payload_size: usize,
    /// Policy for bytes beyond the declared frame length.
    pub trailing: TrailingBytes,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// Derive the payload bound from a total frame capacity (header included).
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_payload_size = max_frame_size
            .saturating_sub(HEADER_SIZE)
            .min(WIRE_MAX_PAYLOAD);
        self
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            trailing: TrailingBytes::Reject,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
