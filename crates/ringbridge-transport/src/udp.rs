use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DatagramSink;

/// Maximum payload of a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Sends outbound messages to a fixed collector endpoint.
///
/// Message boundaries are datagram boundaries; no framing is added.
#[derive(Debug)]
pub struct UdpCollector {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpCollector {
    /// Open an ephemeral local socket that sends to `target`.
    pub fn open(target: SocketAddr) -> Result<Self> {
        let local = match target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        debug!(%target, "opened collector datagram socket");
        Ok(Self { socket, target })
    }

    /// The collector endpoint datagrams are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl DatagramSink for UdpCollector {
    fn send_datagram(&self, payload: &[u8]) -> Result<usize> {
        let sent = self
            .socket
            .send_to(payload, self.target)
            .map_err(|source| TransportError::Send {
                addr: self.target,
                source,
            })?;
        if sent != payload.len() {
            return Err(TransportError::ShortSend {
                addr: self.target,
                sent,
                len: payload.len(),
            });
        }
        Ok(sent)
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.target)
    }
}

/// Receives datagrams on a bound port (the collector side).
#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpReceiver {
    /// Bind a datagram socket on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!(%local_addr, "listening for datagrams");
        Ok(Self { socket, local_addr })
    }

    /// Bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound how long [`Self::recv`] blocks before returning `Ok(None)`.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Receive one datagram into `buf`.
    ///
    /// Returns `Ok(None)` if the read timeout elapsed with nothing received.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}
