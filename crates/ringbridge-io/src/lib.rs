//! Shared-memory channel interface for the ringbridge relay.
//!
//! The relay never owns a channel. It looks channels up by [`StreamId`],
//! submits buffers into input rings and releases buffers it drained from
//! output rings, all through the [`IoSubsystem`] trait.
//!
//! [`LocalIo`] is an in-process implementation with bounded rings, a slot
//! budget per region and a buffer ledger, used by the CLI and the tests.

pub mod config;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod local;
pub mod stream_id;
pub mod subsystem;

pub use config::IoConfig;
pub use envelope::{encode_envelope, split_envelope, ENVELOPE_HEADER_SIZE};
pub use error::{IoError, Result};
pub use ledger::LedgerSnapshot;
pub use local::{ChannelInfo, LocalBuffer, LocalChannel, LocalIo};
pub use stream_id::StreamId;
pub use subsystem::{ChannelDirection, IoSubsystem, ThreadRegistration};
