//! Socket endpoints for the ringbridge relay.
//!
//! Two transports sit at the edges of the bridge:
//! - a TCP listener whose connections carry length-prefixed control frames
//! - a UDP endpoint that emits one datagram per outbound message
//!
//! This is the lowest layer of ringbridge. Framing and routing build on the
//! [`BridgeStream`] and [`DatagramSink`] types provided here.

pub mod error;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::TcpIngressSocket;
pub use traits::{BridgeStream, DatagramSink};
pub use udp::{UdpCollector, UdpReceiver, MAX_DATAGRAM_SIZE};
