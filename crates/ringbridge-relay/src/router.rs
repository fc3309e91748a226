use std::sync::Arc;

use ringbridge_io::{ChannelDirection, IoError, IoSubsystem, StreamId};

/// Result of looking a stream up.
#[derive(Debug)]
pub enum Route<C> {
    /// The input channel for the stream.
    Found(C),
    /// No input channel is registered for the stream.
    NotFound,
}

/// Maps stream ids to input channels.
///
/// Lookup only: channels are created and owned by the io subsystem, and the
/// router keeps no cache of its own.
pub struct StreamRouter<I: IoSubsystem> {
    io: Arc<I>,
}

impl<I: IoSubsystem> StreamRouter<I> {
    pub fn new(io: Arc<I>) -> Self {
        Self { io }
    }

    /// Find the input channel for `stream_id`.
    ///
    /// Errors other than "not found" (an unregistered thread, for instance)
    /// are passed through.
    pub fn route(&self, stream_id: &StreamId) -> ringbridge_io::Result<Route<I::Channel>> {
        match self.io.find_channel(stream_id, ChannelDirection::Input) {
            Ok(channel) => Ok(Route::Found(channel)),
            Err(IoError::ChannelNotFound { .. }) => Ok(Route::NotFound),
            Err(err) => Err(err),
        }
    }
}

impl<I: IoSubsystem> Clone for StreamRouter<I> {
    fn clone(&self) -> Self {
        Self {
            io: Arc::clone(&self.io),
        }
    }
}

#[cfg(test)]
mod tests {
    use ringbridge_io::{IoConfig, LocalIo};

    use super::*;

    fn io() -> Arc<LocalIo> {
        let io = LocalIo::initialize(IoConfig::default()).unwrap();
        io.register_current_thread().unwrap();
        Arc::new(io)
    }

    #[test]
    fn routes_known_input_stream() {
        let io = io();
        let id = StreamId::random();
        io.create_channel(id, ChannelDirection::Input).unwrap();

        let router = StreamRouter::new(Arc::clone(&io));
        match router.route(&id).unwrap() {
            Route::Found(channel) => assert_eq!(channel.stream_id(), id),
            Route::NotFound => panic!("stream should route"),
        }
    }

    #[test]
    fn output_only_stream_is_not_routable() {
        let io = io();
        let id = StreamId::random();
        io.create_channel(id, ChannelDirection::Output).unwrap();

        let router = StreamRouter::new(io);
        assert!(matches!(router.route(&id).unwrap(), Route::NotFound));
        assert!(matches!(
            router.route(&StreamId::random()).unwrap(),
            Route::NotFound
        ));
    }

    #[test]
    fn unregistered_thread_is_an_error() {
        let io = Arc::new(LocalIo::initialize(IoConfig::default()).unwrap());
        let router = StreamRouter::new(io);
        let err = std::thread::spawn(move || router.route(&StreamId::random()).unwrap_err())
            .join()
            .unwrap();
        assert!(matches!(err, IoError::ThreadNotRegistered(_)));
    }
}
