use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected ingress stream implementing `Read + Write`.
///
/// This is the I/O type returned by [`crate::TcpIngressSocket::accept`] and
/// [`crate::TcpIngressSocket::connect`]. Frame readers and writers sit on top.
pub struct BridgeStream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl Read for BridgeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BridgeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl BridgeStream {
    pub(crate) fn from_tcp(stream: TcpStream, peer: Option<SocketAddr>) -> Self {
        Self {
            inner: stream,
            peer,
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Reads that time out surface as `WouldBlock` or `TimedOut` I/O errors,
    /// depending on platform.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Disable Nagle's algorithm so small frames leave immediately.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Address of the remote end, if it was known at accept/connect time.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for BridgeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}

/// Destination for outbound messages, one datagram per call.
///
/// Implementations must be safe to share across the egress thread and the
/// supervisor.
pub trait DatagramSink: Send + Sync {
    /// Send `payload` as a single datagram. Returns the number of bytes sent.
    fn send_datagram(&self, payload: &[u8]) -> Result<usize>;

    /// Human-readable destination for diagnostics.
    fn describe(&self) -> String;
}
