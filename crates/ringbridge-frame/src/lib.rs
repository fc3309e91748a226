//! Length-prefixed framing for the ringbridge ingress stream.
//!
//! Every frame on the wire is:
//! - A 2-byte little-endian payload length
//! - Exactly that many payload bytes
//!
//! There is no magic number, version byte or checksum. Readers accumulate
//! partial reads internally and hand callers complete frames only.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, peek_payload_len, Frame, FrameConfig, TrailingBytes,
    DEFAULT_MAX_FRAME, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, WIRE_MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
