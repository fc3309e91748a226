//! Bridge between a length-prefixed TCP stream, shared-memory rings and a
//! UDP collector.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP ingress listener and UDP datagram endpoints
//! - [`frame`]: length-prefixed frame codec with partial-read handling
//! - [`io`]: stream ids, the channel subsystem trait and the in-process region
//! - [`relay`]: ingress, egress and the supervisor that runs them

/// Re-export transport types.
pub mod transport {
    pub use ringbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ringbridge_frame::*;
}

/// Re-export channel subsystem types.
pub mod io {
    pub use ringbridge_io::*;
}

/// Re-export relay types.
pub mod relay {
    pub use ringbridge_relay::*;
}
