//! Relay counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters updated by relay threads.
#[derive(Debug, Default)]
pub struct BridgeStats {
    connections_accepted: AtomicU64,
    connections_closed: AtomicU64,
    protocol_errors: AtomicU64,
    frames_received: AtomicU64,
    frames_dispatched: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_unknown_stream: AtomicU64,
    dropped_submit_failed: AtomicU64,
    dropped_lookup_failed: AtomicU64,
    datagrams_sent: AtomicU64,
    send_failures: AtomicU64,
    serialize_failures: AtomicU64,
    buffers_released: AtomicU64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl BridgeStats {
    counter! {
        connection_accepted => connections_accepted,
        connection_closed => connections_closed,
        protocol_error => protocol_errors,
        frame_received => frames_received,
        frame_dispatched => frames_dispatched,
        dropped_malformed => dropped_malformed,
        dropped_unknown_stream => dropped_unknown_stream,
        dropped_submit_failed => dropped_submit_failed,
        dropped_lookup_failed => dropped_lookup_failed,
        datagram_sent => datagrams_sent,
        send_failure => send_failures,
        serialize_failure => serialize_failures,
        buffer_released => buffers_released,
    }

    /// Copy the counters out.
    pub fn summary(&self) -> BridgeSummary {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        BridgeSummary {
            connections_accepted: load(&self.connections_accepted),
            connections_closed: load(&self.connections_closed),
            protocol_errors: load(&self.protocol_errors),
            frames_received: load(&self.frames_received),
            frames_dispatched: load(&self.frames_dispatched),
            dropped_malformed: load(&self.dropped_malformed),
            dropped_unknown_stream: load(&self.dropped_unknown_stream),
            dropped_submit_failed: load(&self.dropped_submit_failed),
            dropped_lookup_failed: load(&self.dropped_lookup_failed),
            datagrams_sent: load(&self.datagrams_sent),
            send_failures: load(&self.send_failures),
            serialize_failures: load(&self.serialize_failures),
            buffers_released: load(&self.buffers_released),
        }
    }
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeSummary {
    pub connections_accepted: u64,
    pub connections_closed: u64,
    /// Connections terminated for violating the wire protocol.
    pub protocol_errors: u64,
    pub frames_received: u64,
    /// Frames submitted to an input channel.
    pub frames_dispatched: u64,
    /// Frames whose payload could not be decoded into a buffer.
    pub dropped_malformed: u64,
    pub dropped_unknown_stream: u64,
    /// Frames lost because the channel refused the buffer (ring full).
    pub dropped_submit_failed: u64,
    /// Frames lost because the channel lookup itself failed.
    pub dropped_lookup_failed: u64,
    pub datagrams_sent: u64,
    pub send_failures: u64,
    pub serialize_failures: u64,
    /// Output buffers released by egress.
    pub buffers_released: u64,
}

impl BridgeSummary {
    /// Frames received but not dispatched, for any reason.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_malformed
            + self.dropped_unknown_stream
            + self.dropped_submit_failed
            + self.dropped_lookup_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reflects_counters() {
        let stats = BridgeStats::default();
        stats.frame_received();
        stats.frame_received();
        stats.frame_received();
        stats.frame_dispatched();
        stats.dropped_unknown_stream();
        stats.dropped_submit_failed();
        stats.dropped_lookup_failed();

        let summary = stats.summary();
        assert_eq!(summary.frames_received, 3);
        assert_eq!(summary.frames_dispatched, 1);
        assert_eq!(summary.frames_dropped(), 3);
        assert_eq!(summary.datagrams_sent, 0);
    }

    #[test]
    fn summary_serializes_flat() {
        let stats = BridgeStats::default();
        stats.datagram_sent();
        let value = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(value["datagrams_sent"], 1);
        assert_eq!(value["send_failures"], 0);
    }
}
