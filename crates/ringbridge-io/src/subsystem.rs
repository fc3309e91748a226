use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream_id::StreamId;

/// Which way data flows through a channel, seen from the codelet side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelDirection {
    /// Control traffic flowing into the shared-memory side.
    Input,
    /// Telemetry flowing out towards the collector.
    Output,
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelDirection::Input => f.write_str("input"),
            ChannelDirection::Output => f.write_str("output"),
        }
    }
}

/// The channel subsystem the relay is built against.
///
/// Implementations own every channel and buffer. All methods must be safe
/// to call concurrently from any thread that has called
/// [`IoSubsystem::register_current_thread`]; the relay performs no locking
/// of its own around them.
///
/// Buffers move by value: [`IoSubsystem::submit_buffer`] and
/// [`IoSubsystem::release_buffer`] consume them, so a buffer cannot be
/// released twice or touched after release.
pub trait IoSubsystem: Send + Sync {
    /// Handle to one directional ring.
    type Channel: Send;
    /// One message-sized slot borrowed from a ring.
    type Buffer: Send;

    /// Register the calling thread. Must precede every other call on that thread.
    fn register_current_thread(&self) -> Result<()>;

    /// Forget the calling thread. Later calls from it are refused until it
    /// registers again.
    fn unregister_current_thread(&self);

    /// Look up the ring for `stream_id` in `direction`.
    fn find_channel(&self, stream_id: &StreamId, direction: ChannelDirection)
        -> Result<Self::Channel>;

    /// Decode a raw message into a freshly acquired buffer.
    ///
    /// The stream id is extracted from the message envelope and returned
    /// alongside the buffer.
    fn deserialize_into_buffer(&self, raw: &[u8]) -> Result<(Self::Buffer, StreamId)>;

    /// Hand `buffer` to `channel`.
    ///
    /// The buffer is consumed whether or not the submission succeeds.
    fn submit_buffer(&self, channel: &Self::Channel, buffer: Self::Buffer) -> Result<()>;

    /// Encode `buffer` into `out`, returning the number of bytes written.
    fn serialize_buffer(&self, buffer: &Self::Buffer, out: &mut [u8]) -> Result<usize>;

    /// Return `buffer` to its ring.
    fn release_buffer(&self, buffer: Self::Buffer);

    /// Drain ready output buffers, up to `max_batch` per channel.
    ///
    /// `handler` is called once per channel with buffers in ring order and
    /// becomes responsible for releasing each of them. Returns the number of
    /// buffers handed out.
    fn poll_output_buffers(
        &self,
        max_batch: usize,
        handler: &mut dyn FnMut(&StreamId, Vec<Self::Buffer>),
    ) -> Result<usize>;
}

/// Keeps the calling thread registered for as long as it is alive.
///
/// Threads that come and go, such as one per connection, should hold one of
/// these so the subsystem does not accumulate dead registrations.
#[must_use = "the thread is unregistered when the guard is dropped"]
pub struct ThreadRegistration<'a, I: IoSubsystem + ?Sized> {
    io: &'a I,
}

impl<'a, I: IoSubsystem + ?Sized> ThreadRegistration<'a, I> {
    /// Register the calling thread with `io`.
    pub fn register(io: &'a I) -> Result<Self> {
        io.register_current_thread()?;
        Ok(Self { io })
    }
}

impl<I: IoSubsystem + ?Sized> Drop for ThreadRegistration<'_, I> {
    fn drop(&mut self) {
        self.io.unregister_current_thread();
    }
}
