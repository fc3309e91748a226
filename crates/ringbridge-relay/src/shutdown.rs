use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cooperative stop flag shared by every relay thread.
///
/// Threads check it between blocking calls. Sleepers use
/// [`ShutdownSignal::wait_timeout`] so a trigger wakes them early.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    triggered: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake all waiters. Idempotent.
    pub fn trigger(&self) {
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Sleep up to `timeout`, returning early once triggered.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _) = self
            .inner
            .cond
            .wait_timeout_while(guard, timeout, |_| !self.is_triggered())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_triggered()
    }
}
