//! Buffer accounting for [`crate::LocalIo`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    acquired: AtomicU64,
    submitted: AtomicU64,
    published: AtomicU64,
    handed_out: AtomicU64,
    consumed: AtomicU64,
    released: AtomicU64,
    leaked: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Entry {
    Acquired,
    Submitted,
    Published,
    HandedOut,
    Consumed,
    Released,
    Leaked,
}

impl Ledger {
    pub(crate) fn record(&self, entry: Entry) {
        let counter = match entry {
            Entry::Acquired => &self.acquired,
            Entry::Submitted => &self.submitted,
            Entry::Published => &self.published,
            Entry::HandedOut => &self.handed_out,
            Entry::Consumed => &self.consumed,
            Entry::Released => &self.released,
            Entry::Leaked => &self.leaked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            handed_out: self.handed_out.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            leaked: self.leaked.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of buffer traffic through a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    /// Buffers created by deserialization.
    pub acquired: u64,
    /// Buffers parked in a ring by a successful submit.
    pub submitted: u64,
    /// Buffers parked in an output ring by a producer.
    pub published: u64,
    /// Buffers given to a poll handler.
    pub handed_out: u64,
    /// Buffers taken off input rings by a consumer.
    pub consumed: u64,
    /// Buffers returned through release, including failed submits.
    pub released: u64,
    /// Buffers dropped while checked out, without submit or release.
    pub leaked: u64,
}

impl LedgerSnapshot {
    /// Buffers currently checked out of the region by callers.
    pub fn outstanding(&self) -> u64 {
        (self.acquired + self.handed_out)
            .saturating_sub(self.submitted + self.released + self.leaked)
    }
}
