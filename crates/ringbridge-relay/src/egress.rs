//! Datagram side of the relay: drain output channels to the collector.

use std::sync::Arc;
use std::time::Duration;

use ringbridge_io::{IoSubsystem, StreamId, ThreadRegistration};
use ringbridge_transport::DatagramSink;
use tracing::{debug, error, info, trace, warn};

use crate::shutdown::ShutdownSignal;
use crate::stats::BridgeStats;

/// Upper bound on drain passes once shutdown has been requested.
const MAX_FINAL_PASSES: usize = 64;

/// Polls output channels and forwards each buffer as one datagram.
pub struct EgressBridge<I: IoSubsystem> {
    io: Arc<I>,
    sink: Arc<dyn DatagramSink>,
    stats: Arc<BridgeStats>,
    scratch: Vec<u8>,
    batch: usize,
    poll_interval: Duration,
    backlog: bool,
}

impl<I: IoSubsystem> EgressBridge<I> {
    /// `scratch_size` bounds one serialized message; larger ones are
    /// dropped.
    pub fn new(
        io: Arc<I>,
        sink: Arc<dyn DatagramSink>,
        stats: Arc<BridgeStats>,
        scratch_size: usize,
        batch: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            io,
            sink,
            stats,
            scratch: vec![0u8; scratch_size],
            batch,
            poll_interval,
            backlog: false,
        }
    }

    /// Run one poll over every output channel.
    ///
    /// Every buffer handed out is released exactly once, whether or not it
    /// reached the collector. Returns the number of buffers handled.
    pub fn drain_once(&mut self) -> ringbridge_io::Result<usize> {
        let io = self.io.as_ref();
        let sink = self.sink.as_ref();
        let stats = self.stats.as_ref();
        let scratch = self.scratch.as_mut_slice();
        let batch = self.batch;
        let mut backlog = false;

        let handled = io.poll_output_buffers(batch, &mut |stream_id, buffers| {
            trace!(%stream_id, count = buffers.len(), "draining output channel");
            backlog |= buffers.len() >= batch;
            for buffer in buffers {
                forward(io, sink, stats, scratch, stream_id, &buffer);
                io.release_buffer(buffer);
                stats.buffer_released();
            }
        });
        self.backlog = backlog;
        handled
    }

    /// Whether the last pass filled a whole batch on some channel, meaning
    /// more buffers are probably waiting.
    pub fn has_backlog(&self) -> bool {
        self.backlog
    }

    /// Poll until `shutdown` fires, then drain what is left.
    ///
    /// Sleeps `poll_interval` between passes unless the previous pass left a
    /// backlog, in which case the next pass starts immediately.
    pub fn run(mut self, shutdown: ShutdownSignal) {
        let io = Arc::clone(&self.io);
        let _registration = match ThreadRegistration::register(io.as_ref()) {
            Ok(registration) => registration,
            Err(err) => {
                error!(error = %err, "cannot register egress thread, egress disabled");
                return;
            }
        };
        info!(collector = %self.sink.describe(), "egress started");

        loop {
            if let Err(err) = self.drain_once() {
                self.backlog = false;
                warn!(error = %err, "egress poll failed");
            }
            if self.backlog {
                if shutdown.is_triggered() {
                    break;
                }
                continue;
            }
            if shutdown.wait_timeout(self.poll_interval) {
                break;
            }
        }

        let mut drained = 0usize;
        for _ in 0..MAX_FINAL_PASSES {
            match self.drain_once() {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(err) => {
                    warn!(error = %err, "final egress drain failed");
                    break;
                }
            }
        }
        info!(drained, "egress stopped");
    }
}

fn forward<I: IoSubsystem>(
    io: &I,
    sink: &dyn DatagramSink,
    stats: &BridgeStats,
    scratch: &mut [u8],
    stream_id: &StreamId,
    buffer: &I::Buffer,
) {
    let len = match io.serialize_buffer(buffer, scratch) {
        Ok(0) => {
            warn!(%stream_id, "serializer produced no bytes, skipping");
            stats.serialize_failure();
            return;
        }
        Ok(len) => len,
        Err(err) => {
            warn!(%stream_id, error = %err, "cannot serialize output buffer, skipping");
            stats.serialize_failure();
            return;
        }
    };

    match sink.send_datagram(&scratch[..len]) {
        Ok(_) => {
            debug!(%stream_id, len, "datagram sent");
            stats.datagram_sent();
        }
        Err(err) => {
            warn!(%stream_id, error = %err, "datagram send failed");
            stats.send_failure();
        }
    }
}
