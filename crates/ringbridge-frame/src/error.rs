/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// More bytes arrived than the frame header declared.
    #[error("unexpected number of bytes in buffer, expected: {expected}, got: {received}")]
    TrailingBytes { expected: usize, received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection was closed with part of a frame buffered.
    #[error("connection closed (incomplete frame, {buffered} bytes buffered)")]
    Truncated { buffered: usize },
}

impl FrameError {
    /// True if this is a read/write timeout rather than a real failure.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                )
        )
    }

    /// True if the peer went away, cleanly or mid-frame.
    pub fn is_disconnect(&self) -> bool {
        match self {
            FrameError::ConnectionClosed | FrameError::Truncated { .. } => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// True for violations of the wire protocol by the peer.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            FrameError::PayloadTooLarge { .. } | FrameError::TrailingBytes { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
