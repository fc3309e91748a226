use crate::stream_id::StreamId;
use crate::subsystem::ChannelDirection;

/// Errors reported by the channel subsystem.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The calling thread never registered with the subsystem.
    #[error("thread {0} is not registered with the io subsystem")]
    ThreadNotRegistered(String),

    /// No channel exists for the stream in the requested direction.
    #[error("no {direction} channel for stream {stream_id}")]
    ChannelNotFound {
        stream_id: StreamId,
        direction: ChannelDirection,
    },

    /// A channel for the stream and direction already exists.
    #[error("{direction} channel for stream {stream_id} already exists")]
    ChannelExists {
        stream_id: StreamId,
        direction: ChannelDirection,
    },

    /// The ring has no free slot.
    #[error("ring for stream {stream_id} is full ({capacity} slots)")]
    RingFull { stream_id: StreamId, capacity: usize },

    /// The region cannot back any more slots.
    #[error("region exhausted (requested {requested} slots, {available} available)")]
    RegionExhausted { requested: usize, available: usize },

    /// The raw message is not a valid envelope.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The message body does not fit in a slot.
    #[error("message body of {size} bytes exceeds slot capacity of {capacity}")]
    BufferOverflow { size: usize, capacity: usize },

    /// The caller's scratch area cannot hold the serialized message.
    #[error("serialized message needs {needed} bytes, scratch holds {capacity}")]
    ScratchTooSmall { needed: usize, capacity: usize },

    /// Text could not be parsed as a stream identifier.
    #[error("invalid stream id {input:?}: {reason}")]
    InvalidStreamId { input: String, reason: String },

    /// Configuration rejected at initialization.
    #[error("invalid io configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IoError>;
