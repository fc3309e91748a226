//! TCP side of the relay: accept connections, cut frames, submit them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbridge_frame::{FrameConfig, FrameReader};
use ringbridge_io::{IoSubsystem, StreamId, ThreadRegistration};
use ringbridge_transport::{BridgeStream, TcpIngressSocket};
use tracing::{debug, error, info, warn};

use crate::router::{Route, StreamRouter};
use crate::shutdown::ShutdownSignal;
use crate::stats::BridgeStats;

/// What happened to one ingress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Submitted to the stream's input channel.
    Dispatched(StreamId),
    /// The payload could not be decoded into a buffer.
    Malformed,
    /// No input channel exists for the stream; the buffer was released.
    UnknownStream(StreamId),
    /// Lookup or submission failed; the buffer is gone.
    Rejected(StreamId),
}

/// State shared by the accept thread and every connection thread.
pub(crate) struct IngressContext<I: IoSubsystem> {
    pub(crate) io: Arc<I>,
    pub(crate) router: StreamRouter<I>,
    pub(crate) stats: Arc<BridgeStats>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) frame_config: FrameConfig,
    pub(crate) accept_poll_interval: Duration,
}

/// Decode one frame payload and hand it to its input channel.
///
/// Never fails: every failure is logged, counted and turned into a drop, so
/// the connection keeps reading.
pub fn handle_frame<I: IoSubsystem>(
    io: &I,
    router: &StreamRouter<I>,
    stats: &BridgeStats,
    payload: &[u8],
) -> FrameOutcome {
    let (buffer, stream_id) = match io.deserialize_into_buffer(payload) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(len = payload.len(), error = %err, "dropping undecodable frame");
            stats.dropped_malformed();
            return FrameOutcome::Malformed;
        }
    };

    let channel = match router.route(&stream_id) {
        Ok(Route::Found(channel)) => channel,
        Ok(Route::NotFound) => {
            warn!(%stream_id, "no input channel for stream, dropping frame");
            io.release_buffer(buffer);
            stats.dropped_unknown_stream();
            return FrameOutcome::UnknownStream(stream_id);
        }
        Err(err) => {
            error!(%stream_id, error = %err, "channel lookup failed, dropping frame");
            io.release_buffer(buffer);
            stats.dropped_lookup_failed();
            return FrameOutcome::Rejected(stream_id);
        }
    };

    match io.submit_buffer(&channel, buffer) {
        Ok(()) => {
            debug!(%stream_id, len = payload.len(), "frame dispatched");
            stats.frame_dispatched();
            FrameOutcome::Dispatched(stream_id)
        }
        Err(err) => {
            warn!(%stream_id, error = %err, "submit failed, dropping frame");
            stats.dropped_submit_failed();
            FrameOutcome::Rejected(stream_id)
        }
    }
}

/// Accept connections until shutdown, then join every connection thread.
pub(crate) fn accept_loop<I: IoSubsystem + 'static>(
    listener: TcpIngressSocket,
    ctx: Arc<IngressContext<I>>,
) {
    let mut connections: Vec<JoinHandle<()>> = Vec::new();
    let mut next_conn_id = 1u64;

    while !ctx.shutdown.is_triggered() {
        match listener.try_accept() {
            Ok(Some(stream)) => {
                let conn_id = next_conn_id;
                next_conn_id += 1;
                ctx.stats.connection_accepted();
                info!(conn_id, peer = ?stream.peer_addr(), "accepted ingress connection");

                let conn_ctx = Arc::clone(&ctx);
                let spawned = thread::Builder::new()
                    .name(format!("ringbridge-conn-{conn_id}"))
                    .spawn(move || serve_connection(&conn_ctx, stream, conn_id));
                match spawned {
                    Ok(handle) => connections.push(handle),
                    Err(err) => {
                        error!(conn_id, error = %err, "cannot spawn connection thread");
                        ctx.stats.connection_closed();
                    }
                }
            }
            Ok(None) => {
                ctx.shutdown.wait_timeout(ctx.accept_poll_interval);
            }
            Err(err) => {
                warn!(error = %err, "accept failed, retrying");
                ctx.shutdown.wait_timeout(ctx.accept_poll_interval);
            }
        }

        reap_finished(&mut connections);
    }

    debug!(open = connections.len(), "ingress stopping, joining connections");
    for handle in connections {
        join_connection(handle);
    }
    info!("ingress stopped");
}

fn reap_finished(connections: &mut Vec<JoinHandle<()>>) {
    let mut i = 0;
    while i < connections.len() {
        if connections[i].is_finished() {
            join_connection(connections.swap_remove(i));
        } else {
            i += 1;
        }
    }
}

fn join_connection(handle: JoinHandle<()>) {
    let name = handle.thread().name().map(str::to_string);
    if handle.join().is_err() {
        error!(thread = ?name, "connection thread panicked");
    }
}

/// Read frames from one connection until the peer leaves, breaks the
/// protocol, or shutdown is requested.
fn serve_connection<I: IoSubsystem>(ctx: &IngressContext<I>, stream: BridgeStream, conn_id: u64) {
    let _registration = match ThreadRegistration::register(ctx.io.as_ref()) {
        Ok(registration) => registration,
        Err(err) => {
            error!(conn_id, error = %err, "cannot register connection thread");
            if let Err(err) = stream.shutdown() {
                debug!(conn_id, error = %err, "socket shutdown failed");
            }
            ctx.stats.connection_closed();
            return;
        }
    };

    let mut reader = match FrameReader::with_config_stream(stream, ctx.frame_config.clone()) {
        Ok(reader) => reader,
        Err(err) => {
            error!(conn_id, error = %err, "cannot configure connection");
            ctx.stats.connection_closed();
            return;
        }
    };

    loop {
        if ctx.shutdown.is_triggered() {
            debug!(conn_id, "shutdown requested, closing connection");
            break;
        }

        match reader.poll_frame() {
            Ok(Some(frame)) => {
                ctx.stats.frame_received();
                handle_frame(ctx.io.as_ref(), &ctx.router, &ctx.stats, &frame.payload);
            }
            Ok(None) => continue,
            Err(err) if err.is_timeout() => continue,
            Err(err) if err.is_disconnect() => {
                info!(conn_id, reason = %err, "ingress peer disconnected");
                break;
            }
            Err(err) if err.is_protocol_violation() => {
                warn!(conn_id, error = %err, "protocol violation, closing connection");
                ctx.stats.protocol_error();
                break;
            }
            Err(err) => {
                warn!(conn_id, error = %err, "read failed, closing connection");
                break;
            }
        }
    }

    if let Err(err) = reader.get_ref().shutdown() {
        debug!(conn_id, error = %err, "socket shutdown failed");
    }
    ctx.stats.connection_closed();
}

#[cfg(test)]
mod tests {
    use ringbridge_io::{
        encode_envelope, ChannelDirection, IoConfig, IoError, LocalBuffer, LocalChannel, LocalIo,
    };

    use super::*;

    fn setup() -> (Arc<LocalIo>, StreamRouter<LocalIo>, BridgeStats) {
        let io = Arc::new(LocalIo::initialize(IoConfig::default()).unwrap());
        io.register_current_thread().unwrap();
        let router = StreamRouter::new(Arc::clone(&io));
        (io, router, BridgeStats::default())
    }

    fn envelope(stream_id: &StreamId, body: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        encode_envelope(stream_id, body, &mut raw);
        raw
    }

    #[test]
    fn known_stream_is_dispatched() {
        let (io, router, stats) = setup();
        let id = StreamId::random();
        io.create_channel(id, ChannelDirection::Input).unwrap();

        let outcome = handle_frame(io.as_ref(), &router, &stats, &envelope(&id, b"HELLO"));
        assert_eq!(outcome, FrameOutcome::Dispatched(id));
        assert_eq!(io.take_input(&id).unwrap().unwrap().as_ref(), b"HELLO");
        assert_eq!(stats.summary().frames_dispatched, 1);
    }

    #[test]
    fn unknown_stream_releases_buffer() {
        let (io, router, stats) = setup();
        let id = StreamId::random();

        let outcome = handle_frame(io.as_ref(), &router, &stats, &envelope(&id, b"lost"));
        assert_eq!(outcome, FrameOutcome::UnknownStream(id));

        let ledger = io.ledger();
        assert_eq!(ledger.acquired, 1);
        assert_eq!(ledger.released, 1);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(stats.summary().dropped_unknown_stream, 1);
    }

    #[test]
    fn short_payload_is_malformed() {
        let (io, router, stats) = setup();
        let outcome = handle_frame(io.as_ref(), &router, &stats, b"tiny");
        assert_eq!(outcome, FrameOutcome::Malformed);
        assert_eq!(io.ledger().acquired, 0);
        assert_eq!(stats.summary().dropped_malformed, 1);
    }

    #[test]
    fn full_ring_drops_without_retry() {
        let (io, router, stats) = setup();
        let id = StreamId::random();
        io.create_channel_with_capacity(id, ChannelDirection::Input, 1)
            .unwrap();

        let first = handle_frame(io.as_ref(), &router, &stats, &envelope(&id, b"1"));
        let second = handle_frame(io.as_ref(), &router, &stats, &envelope(&id, b"2"));
        assert_eq!(first, FrameOutcome::Dispatched(id));
        assert_eq!(second, FrameOutcome::Rejected(id));
        assert_eq!(io.ledger().outstanding(), 0);
        assert_eq!(stats.summary().dropped_submit_failed, 1);
    }

    /// Delegates to [`LocalIo`] but fails every channel lookup.
    struct BrokenLookup(LocalIo);

    impl IoSubsystem for BrokenLookup {
        type Channel = LocalChannel;
        type Buffer = LocalBuffer;

        fn register_current_thread(&self) -> ringbridge_io::Result<()> {
            self.0.register_current_thread()
        }

        fn unregister_current_thread(&self) {
            self.0.unregister_current_thread();
        }

        fn find_channel(
            &self,
            _stream_id: &StreamId,
            _direction: ChannelDirection,
        ) -> ringbridge_io::Result<LocalChannel> {
            Err(IoError::ThreadNotRegistered("lookup".to_string()))
        }

        fn deserialize_into_buffer(
            &self,
            raw: &[u8],
        ) -> ringbridge_io::Result<(LocalBuffer, StreamId)> {
            self.0.deserialize_into_buffer(raw)
        }

        fn submit_buffer(
            &self,
            channel: &LocalChannel,
            buffer: LocalBuffer,
        ) -> ringbridge_io::Result<()> {
            self.0.submit_buffer(channel, buffer)
        }

        fn serialize_buffer(
            &self,
            buffer: &LocalBuffer,
            out: &mut [u8],
        ) -> ringbridge_io::Result<usize> {
            self.0.serialize_buffer(buffer, out)
        }

        fn release_buffer(&self, buffer: LocalBuffer) {
            self.0.release_buffer(buffer);
        }

        fn poll_output_buffers(
            &self,
            max_batch: usize,
            handler: &mut dyn FnMut(&StreamId, Vec<LocalBuffer>),
        ) -> ringbridge_io::Result<usize> {
            self.0.poll_output_buffers(max_batch, handler)
        }
    }

    #[test]
    fn lookup_failure_is_counted_apart_from_full_rings() {
        let io = Arc::new(BrokenLookup(LocalIo::initialize(IoConfig::default()).unwrap()));
        io.register_current_thread().unwrap();
        let router = StreamRouter::new(Arc::clone(&io));
        let stats = BridgeStats::default();
        let id = StreamId::random();

        let outcome = handle_frame(io.as_ref(), &router, &stats, &envelope(&id, b"x"));
        assert_eq!(outcome, FrameOutcome::Rejected(id));

        let summary = stats.summary();
        assert_eq!(summary.dropped_lookup_failed, 1);
        assert_eq!(summary.dropped_submit_failed, 0);
        assert_eq!(io.0.ledger().outstanding(), 0);
    }
}
