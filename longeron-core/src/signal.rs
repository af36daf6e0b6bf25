//! One-shot cancellation / shutdown signal.
//!
//! A `Signal` starts unset and latches permanently once [`Signal::set`] is
//! called. Continuations consult it before issuing their next OS call, and
//! anything parked in [`Signal::wait`] wakes when it fires. The same type
//! serves as the endpoint-wide shutdown flag and as the per-operation
//! cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

struct Inner {
    set: AtomicBool,
    // Dropping the held sender disconnects every waiter at once.
    armed: Mutex<Option<flume::Sender<()>>>,
    waiters: flume::Receiver<()>,
}

/// Clonable one-shot signal. All clones observe the same state.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<Inner>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded::<()>(1);
        Self {
            inner: Arc::new(Inner {
                set: AtomicBool::new(false),
                armed: Mutex::new(Some(tx)),
                waiters: rx,
            }),
        }
    }

    /// Latch the signal. Idempotent; wakes every waiter.
    pub fn set(&self) {
        self.inner.set.store(true, Ordering::Release);
        self.inner.armed.lock().take();
    }

    /// Check whether the signal has fired.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Park until the signal fires. Returns immediately if already set.
    pub async fn wait(&self) {
        if self.is_set() {
            return;
        }
        // Nothing is ever sent; the recv resolves with `Disconnected` when
        // `set` drops the sender. No wakeup can be lost between the flag
        // check above and this call.
        let _ = self.inner.waiters.recv_async().await;
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("set", &self.is_set()).finish()
    }
}
