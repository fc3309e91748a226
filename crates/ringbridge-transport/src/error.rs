use std::net::SocketAddr;

/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Failed to send a datagram to the collector.
    #[error("failed to send datagram to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The datagram was only partially written.
    #[error("short datagram write to {addr} ({sent} of {len} bytes)")]
    ShortSend {
        addr: SocketAddr,
        sent: usize,
        len: usize,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
