//! Relay between length-prefixed TCP frames, shared-memory channels and
//! UDP datagrams.
//!
//! Ingress accepts TCP connections, cuts each byte stream into frames and
//! submits every frame to the input channel named by its stream id. Egress
//! polls output channels and sends each buffer to the collector as one
//! datagram. [`BridgeSupervisor`] starts both sides and [`BridgeHandle`]
//! stops them.

pub mod config;
pub mod egress;
pub mod error;
pub mod ingress;
pub mod router;
pub mod shutdown;
pub mod stats;
pub mod supervisor;

pub use config::{BridgeConfig, DEFAULT_COLLECTOR_PORT, DEFAULT_INGRESS_PORT};
pub use egress::EgressBridge;
pub use error::{RelayError, Result};
pub use ingress::{handle_frame, FrameOutcome};
pub use router::{Route, StreamRouter};
pub use shutdown::ShutdownSignal;
pub use stats::{BridgeStats, BridgeSummary};
pub use supervisor::{BridgeHandle, BridgeSupervisor};
