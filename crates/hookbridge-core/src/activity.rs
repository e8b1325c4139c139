//! Keep-alive accounting for an execution context.
//!
//! A context reaches its natural exit point when its scheduler has no
//! runnable work and no *ref'd* source is outstanding. Sources that should
//! hold the context open (ref'd timers, an in-flight bridge round trip,
//! explicit handles) hold a [`KeepAlive`] guard; unref'd sources simply
//! don't.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared ref counter of one execution context.
///
/// Besides the live count it keeps an epoch bumped on every acquisition,
/// so an observer can tell whether anything was ref'd between two idle
/// points even if the count is back to zero.
#[derive(Clone, Default)]
pub struct Activity {
    refs: Arc<AtomicUsize>,
    epoch: Arc<AtomicU64>,
}

impl Activity {
    /// Creates a counter with no outstanding refs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a ref that keeps the context alive until the guard is dropped.
    pub fn keep_alive(&self, reason: &'static str) -> KeepAlive {
        self.refs.fetch_add(1, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(reason, refs = self.refs(), "keep-alive acquired");
        KeepAlive {
            refs: Arc::clone(&self.refs),
            epoch: Arc::clone(&self.epoch),
            reason,
            held: true,
        }
    }

    /// Number of acquisitions so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Number of outstanding refs.
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    /// Whether no ref is outstanding.
    pub fn is_idle(&self) -> bool {
        self.refs() == 0
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity").field("refs", &self.refs()).finish()
    }
}

/// RAII ref on an [`Activity`].
pub struct KeepAlive {
    refs: Arc<AtomicUsize>,
    epoch: Arc<AtomicU64>,
    reason: &'static str,
    held: bool,
}

impl KeepAlive {
    /// Drops the ref early while keeping the guard value around.
    pub fn unref(&mut self) {
        if self.held {
            self.held = false;
            self.refs.fetch_sub(1, Ordering::SeqCst);
            tracing::trace!(reason = self.reason, "keep-alive released");
        }
    }

    /// Re-acquires the ref after [`unref`](Self::unref).
    pub fn reref(&mut self) {
        if !self.held {
            self.held = true;
            self.refs.fetch_add(1, Ordering::SeqCst);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Whether the guard currently holds its ref.
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.unref();
    }
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAlive")
            .field("reason", &self.reason)
            .field("held", &self.held)
            .finish()
    }
}
