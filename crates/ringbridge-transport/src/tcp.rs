use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BridgeStream;

/// Listening TCP socket for the ingress side of the bridge.
///
/// Provides bind/accept/connect. The listener can be switched to
/// non-blocking mode so an accept loop can observe a shutdown signal between
/// polls instead of parking forever in `accept(2)`.
pub struct TcpIngressSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpIngressSocket {
    /// Bind and listen on `addr`.
    ///
    /// Port `0` picks an ephemeral port; use [`Self::local_addr`] to find it.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%local_addr, "listening for ingress connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Toggle non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// Accept an incoming connection (blocking unless non-blocking mode is on).
    pub fn accept(&self) -> Result<BridgeStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        // BSD-derived platforms hand out accepted sockets that inherit O_NONBLOCK.
        stream.set_nonblocking(false)?;
        debug!(%peer, "accepted connection");
        Ok(BridgeStream::from_tcp(stream, Some(peer)))
    }

    /// Accept a pending connection if one is queued.
    ///
    /// Returns `Ok(None)` when the listener is non-blocking and nothing is
    /// waiting.
    pub fn try_accept(&self) -> Result<Option<BridgeStream>> {
        match self.accept() {
            Ok(stream) => Ok(Some(stream)),
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Connect to a listening ingress socket (blocking).
    pub fn connect(addr: impl ToSocketAddrs) -> Result<BridgeStream> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    debug!(addr = %candidate, "connected to ingress socket");
                    return Ok(BridgeStream::from_tcp(stream, Some(candidate)));
                }
                Err(source) => last_err = Some((candidate, source)),
            }
        }
        match last_err {
            Some((addr, source)) => Err(TransportError::Connect { addr, source }),
            None => Err(TransportError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "address resolved to no candidates",
            ))),
        }
    }

    /// Connect with an upper bound on the handshake time.
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<BridgeStream> {
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        debug!(%addr, "connected to ingress socket");
        Ok(BridgeStream::from_tcp(stream, Some(addr)))
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
