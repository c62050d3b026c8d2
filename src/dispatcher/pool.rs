//! The worker pool that runs admitted calls.
//!
//! A separable interface so test suites can substitute a deterministic inline executor instead
//! of actually spawning tasks onto a runtime — the dispatcher's admission-invariant property
//! tests depend on this.

use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// A boxed unit of work submitted by the dispatcher once a call is admitted.
pub type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks submitted by the [`crate::dispatcher::Dispatcher`].
///
/// `execute` must not block the caller. The dispatcher mutates its own bookkeeping (moving a
/// call from `ready` to `running`) while holding its internal lock, then releases the lock
/// before calling `execute` — so a pool that runs its task synchronously and re-enters the
/// dispatcher (as [`InlineWorkerPool`] does) will not deadlock, but a slow `execute` still
/// stalls whichever thread triggered the admission.
pub trait WorkerPool: Send + Sync + 'static {
    /// Hands `task` off for execution. Must return promptly.
    fn execute(&self, task: BoxedTask);
}

/// Production [`WorkerPool`] backed by the ambient `tokio` runtime.
///
/// Hands each admitted call straight to `tokio`'s blocking-task pool. There is no fixed
/// worker count to pre-spawn: the dispatcher's `max_requests` / `max_requests_per_host`
/// admission limits are what bound concurrency, and `tokio`'s multi-threaded runtime already
/// multiplexes spawned tasks across its own thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWorkerPool;

impl WorkerPool for TokioWorkerPool {
    fn execute(&self, task: BoxedTask) {
        tokio::task::spawn_blocking(task);
    }
}

/// Test double that runs every submitted task synchronously, on the calling thread.
///
/// Makes dispatcher behavior deterministic under `proptest`: an `enqueue` call either admits
/// a task (which then runs to completion before `enqueue` returns) or queues it, with no
/// interleaving from a background thread to reason about.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineWorkerPool;

impl WorkerPool for InlineWorkerPool {
    fn execute(&self, task: BoxedTask) {
        task();
    }
}

/// Test double that records submitted tasks without running them, so a test can inspect
/// dispatcher state between admission and completion, then drain tasks on demand.
///
/// Backed by a lock-free [`SegQueue`], the same hand-off primitive this crate's connection
/// layer uses to pass accepted sockets between threads — here standing in for the
/// `execute`/hand-off boundary itself rather than a pool of live connections.
///
/// The realistic way to exercise the dispatcher's admission accounting (§8 "Concrete
/// scenarios") without real threads or sleeps: enqueue calls, assert on
/// [`crate::dispatcher::Dispatcher::running_calls_count`], then call [`Self::run_next`] to let
/// one call "complete" and observe the next promotion.
#[derive(Default)]
pub struct ManualWorkerPool {
    pending: SegQueue<BoxedTask>,
}

impl ManualWorkerPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks submitted but not yet run.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Runs the oldest pending task, if any. Returns `false` if there was nothing to run.
    pub fn run_next(&self) -> bool {
        match self.pending.pop() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs every pending task, including any it causes to be submitted in turn.
    pub fn run_all(&self) {
        while self.run_next() {}
    }
}

impl WorkerPool for ManualWorkerPool {
    fn execute(&self, task: BoxedTask) {
        self.pending.push(task);
    }
}

pub(crate) fn default_pool() -> Arc<dyn WorkerPool> {
    Arc::new(TokioWorkerPool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_pool_runs_immediately() {
        let pool = InlineWorkerPool;
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.execute(Box::new(move || flag.store(true, std::sync::atomic::Ordering::SeqCst)));
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn manual_pool_defers_until_drained() {
        let pool = ManualWorkerPool::new();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.execute(Box::new(move || flag.store(true, std::sync::atomic::Ordering::SeqCst)));

        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(pool.pending_count(), 1);

        assert!(pool.run_next());
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!pool.run_next());
    }
}
