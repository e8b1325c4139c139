//! Invocation identifiers.
//!
//! Ids are allocated from a per-process monotonic counter and are never
//! reused. Id `0` is reserved for the hook context's initialization so the
//! first real invocation is `1`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier correlating one request with its single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(pub u64);

impl InvocationId {
    /// The id reserved for hook context initialization.
    pub const INIT: InvocationId = InvocationId(0);

    /// Return the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InvocationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Monotonic allocator handing out fresh [`InvocationId`]s.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator whose first id is `1`.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn next(&self) -> InvocationId {
        InvocationId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The most recently allocated id, or [`InvocationId::INIT`] if none.
    pub fn last(&self) -> InvocationId {
        InvocationId(self.next.load(Ordering::Relaxed) - 1)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
