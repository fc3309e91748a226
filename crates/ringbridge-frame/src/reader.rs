use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use ringbridge_transport::BridgeStream;
use tracing::{debug, trace};

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// The accumulation buffer is owned by the reader, so its lifetime is the
/// connection's lifetime.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached on a
    /// frame boundary and `Err(FrameError::Truncated { .. })` when EOF cuts a
    /// frame short. A read timeout surfaces as an I/O error for which
    /// [`FrameError::is_timeout`] holds; buffered bytes are kept, so calling
    /// again resumes where the previous call stopped.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.poll_frame()? {
                return Ok(frame);
            }
        }
    }

    /// Perform at most one read from the stream.
    ///
    /// Returns `Ok(None)` when that read did not complete a frame, so callers
    /// regain control after every blocking call. Errors are as for
    /// [`FrameReader::read_frame`].
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode_buffered()? {
            return Ok(Some(frame));
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.inner.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(err) => return Err(FrameError::Io(err)),
        };

        if read == 0 {
            if self.buf.is_empty() {
                return Err(FrameError::ConnectionClosed);
            }
            debug!(buffered = self.buf.len(), "stream ended inside a frame");
            return Err(FrameError::Truncated {
                buffered: self.buf.len(),
            });
        }

        self.buf.extend_from_slice(&chunk[..read]);
        self.decode_buffered()
    }

    fn decode_buffered(&mut self) -> Result<Option<Frame>> {
        let decoded = decode_frame(
            &mut self.buf,
            self.config.max_payload_size,
            self.config.trailing,
        )?;
        if let Some(frame) = &decoded {
            trace!(len = frame.payload.len(), buffered = self.buf.len(), "frame decoded");
        }
        Ok(decoded)
    }

    /// Number of bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl FrameReader<BridgeStream> {
    /// Create a frame reader for `BridgeStream` and apply read timeout from config.
    pub fn with_config_stream(inner: BridgeStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: ringbridge_transport::TransportError) -> FrameError {
    match err {
        ringbridge_transport::TransportError::Io(io)
        | ringbridge_transport::TransportError::Accept(io) => FrameError::Io(io),
        ringbridge_transport::TransportError::Bind { source, .. }
        | ringbridge_transport::TransportError::Connect { source, .. }
        | ringbridge_transport::TransportError::Send { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
