//! The `Call` capability: the one thing the dispatcher needs to know about a unit of work.
//!
//! The spec calls for "a small capability set `{cancel(), host()}`... no deep hierarchy". Async
//! and sync calls share this one trait; the dispatcher tells them apart by which queue they live
//! in, not by type.

use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the dispatcher needs from a tracked call: its target host (for per-host admission
/// accounting) and a way to signal cancellation.
pub trait Call: Send + Sync + 'static {
    /// The authority (host) this call targets, already lower-cased for case-insensitive
    /// comparison.
    fn host(&self) -> &str;

    /// Marks the call cancelled. Best-effort: the call observes this at its own next
    /// interruptible step: there is no way to halt work already in progress.
    fn cancel(&self);

    /// Whether [`Call::cancel`] has been invoked.
    fn is_cancelled(&self) -> bool;
}

/// A ready-made [`Call`] implementation for callers who don't need a custom one: just a host
/// name and a cancellation flag.
#[derive(Debug)]
pub struct SimpleCall {
    host: String,
    cancelled: AtomicBool,
}

impl SimpleCall {
    /// Creates a call targeting `host`. The host is lower-cased on construction so
    /// [`Call::host`] comparisons are always case-insensitive.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_lowercase(),
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Call for SimpleCall {
    fn host(&self) -> &str {
        &self.host
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
