use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use ringbridge_transport::BridgeStream;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;

/// Encodes payloads as frames onto a `Write` stream.
///
/// Every frame is written whole and flushed before [`FrameWriter::send`]
/// returns; the encode buffer is reused across frames.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_payload_size: usize,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Only `max_payload_size` applies to writing.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size: config.max_payload_size,
        }
    }

    /// Send one payload as a frame (blocking).
    ///
    /// Oversized payloads are refused before anything reaches the stream.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut written = 0usize;
        while written < self.buf.len() {
            match self.inner.write(&self.buf[written..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl FrameWriter<BridgeStream> {
    /// Create a frame writer for `BridgeStream` and apply write timeout from config.
    pub fn with_config_stream(inner: BridgeStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, TrailingBytes, DEFAULT_MAX_PAYLOAD};

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.get_ref().get_ref().as_slice())
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"HELLO").unwrap();

        let mut wire = written(writer);
        assert_eq!(&wire[..2], &[5, 0]);
        let frame = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD, TrailingBytes::Reject)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.as_ref(), b"HELLO");
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"one").unwrap();
        writer.send(b"two").unwrap();

        let mut wire = written(writer);
        let f1 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD, TrailingBytes::CarryOver)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD, TrailingBytes::CarryOver)
            .unwrap()
            .unwrap();

        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!(f2.payload.as_ref(), b"two");
        assert!(wire.is_empty());
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write() {
        let mut writer = FrameWriter::new(InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        });
        writer.send(b"retry").unwrap();

        assert_eq!(writer.get_ref().data, b"\x05\x00retry");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
