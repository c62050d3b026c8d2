//! Admission control and accounting for asynchronous and synchronous calls.
//!
//! [`Dispatcher`] enforces two limits — a global cap and a per-host cap — across calls it
//! admits to a [`WorkerPool`]. Admission never rejects work outright: a call that doesn't fit
//! right now waits in a FIFO `ready` queue until capacity opens up, at which point
//! [`Dispatcher::promote_locked`] walks the queue and promotes whatever now fits.

pub mod call;
pub mod pool;

pub use call::{Call, SimpleCall};
pub use pool::{BoxedTask, InlineWorkerPool, ManualWorkerPool, TokioWorkerPool, WorkerPool};

use crate::{config::DispatcherLimits, error::DispatchError};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

struct ReadyEntry {
    call: Arc<dyn Call>,
    task: BoxedTask,
}

struct State {
    ready: VecDeque<ReadyEntry>,
    running_async: Vec<Arc<dyn Call>>,
    running_sync: Vec<Arc<dyn Call>>,
    limits: DispatcherLimits,
    idle_callback: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Process-wide (per-client) admission coordinator for asynchronous and synchronous calls.
///
/// Guarded by a single mutex covering the three queues, the limit configuration, and the idle
/// callback slot. No network I/O, user callback invocation, or blocking pool submission happens
/// while that mutex is held — see the module docs on [`WorkerPool`] for how submission is kept
/// outside the critical section.
///
/// Must be held behind an `Arc` (see [`Dispatcher::builder`]): [`Dispatcher::enqueue`] clones
/// it into the task it submits so the task can report back via [`Dispatcher::finish_async`]
/// when it completes.
pub struct Dispatcher {
    state: Mutex<State>,
    pool: Arc<dyn WorkerPool>,
}

impl Dispatcher {
    /// Starts building a dispatcher with the default limits (`max_requests: 64`,
    /// `max_requests_per_host: 5`) and the production `tokio`-backed worker pool.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder {
            limits: None,
            pool: None,
        }
    }

    /// Creates a dispatcher with default limits and the production worker pool.
    ///
    /// # Examples
    /// ```
    /// use reqcore::dispatcher::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::new();
    /// assert_eq!(dispatcher.running_calls_count(), 0);
    /// ```
    pub fn new() -> Arc<Dispatcher> {
        Self::builder().build().expect("default limits are always valid")
    }

    /// Admits an async call, or queues it if the dispatcher is at capacity.
    ///
    /// `work` is the actual unit of work (e.g. "open a connection and run the request"). It is
    /// wrapped so that, whenever it finishes — immediately if admitted now, or later if the
    /// pool runs it asynchronously — [`Dispatcher::finish_async`] is called automatically on
    /// `call`. Callers must not call `finish_async` themselves for calls enqueued this way.
    ///
    /// # Examples
    /// ```
    /// use reqcore::dispatcher::{Dispatcher, SimpleCall};
    /// use std::sync::Arc;
    ///
    /// let dispatcher = Dispatcher::new();
    /// let call = Arc::new(SimpleCall::new("example.com"));
    /// dispatcher.enqueue(call, || { /* perform the request */ });
    /// ```
    pub fn enqueue(self: &Arc<Self>, call: Arc<dyn Call>, work: impl FnOnce() + Send + 'static) {
        let dispatcher = Arc::clone(self);
        let call_for_task = Arc::clone(&call);
        let task: BoxedTask = Box::new(move || {
            work();
            dispatcher.finish_async(&call_for_task);
        });

        let mut to_run = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            let running_for_host = running_count_for_host(&state.running_async, call.host());
            if state.running_async.len() < state.limits.max_requests
                && running_for_host < state.limits.max_requests_per_host
            {
                tracing::debug!(host = call.host(), "admitting call directly");
                state.running_async.push(Arc::clone(&call));
                to_run.push(task);
            } else {
                tracing::debug!(host = call.host(), "queueing call, at capacity");
                state.ready.push_back(ReadyEntry { call, task });
            }
        }
        for task in to_run {
            self.pool.execute(task);
        }
    }

    /// Tracks a synchronous call for bookkeeping only: no admission limit applies, since a
    /// blocking call is already throttled by its own calling thread.
    pub fn executed(&self, call: Arc<dyn Call>) {
        self.state.lock().unwrap().running_sync.push(call);
    }

    /// Reports that an async call admitted via [`Dispatcher::enqueue`] has finished.
    ///
    /// # Panics
    /// Panics if `call` is not currently tracked as running — this indicates a programming
    /// error (a call finishing twice, or finishing a call dispatched elsewhere), and per the
    /// spec's error design this is an assertion violation, not a recoverable error.
    pub fn finish_async(&self, call: &Arc<dyn Call>) {
        let mut to_run;
        let idle;
        {
            let mut state = self.state.lock().unwrap();
            let pos = state
                .running_async
                .iter()
                .position(|c| Arc::ptr_eq(c, call))
                .expect("finish_async() called for a call not tracked as running");
            state.running_async.remove(pos);
            to_run = Self::promote_locked(&mut state);
            idle = state.running_async.is_empty() && state.running_sync.is_empty();
        }
        for task in to_run.drain(..) {
            self.pool.execute(task);
        }
        if idle {
            self.fire_idle();
        }
    }

    /// Reports that a synchronous call added via [`Dispatcher::executed`] has finished.
    ///
    /// # Panics
    /// Panics if `call` is not currently tracked as running, for the same reason as
    /// [`Dispatcher::finish_async`].
    pub fn finish_sync(&self, call: &Arc<dyn Call>) {
        let idle;
        {
            let mut state = self.state.lock().unwrap();
            let pos = state
                .running_sync
                .iter()
                .position(|c| Arc::ptr_eq(c, call))
                .expect("finish_sync() called for a call not tracked as running");
            state.running_sync.remove(pos);
            idle = state.running_async.is_empty() && state.running_sync.is_empty();
        }
        if idle {
            self.fire_idle();
        }
    }

    /// Signals cancellation on every tracked call, in all three queues. Does not remove any
    /// entry: removal is still driven by each call's own termination path calling
    /// [`Dispatcher::finish_async`] / [`Dispatcher::finish_sync`].
    pub fn cancel_all(&self) {
        let state = self.state.lock().unwrap();
        for entry in &state.ready {
            entry.call.cancel();
        }
        for call in state.running_async.iter().chain(state.running_sync.iter()) {
            call.cancel();
        }
    }

    /// Sets the global concurrency limit. Must be `>= 1`. Promotes queued calls if the new
    /// limit opens capacity; has no effect on calls already running beyond the new limit.
    pub fn set_max_requests(&self, max_requests: usize) -> Result<(), DispatchError> {
        let mut to_run;
        {
            let mut state = self.state.lock().unwrap();
            DispatcherLimits::validate(max_requests, state.limits.max_requests_per_host)?;
            state.limits.max_requests = max_requests;
            to_run = Self::promote_locked(&mut state);
        }
        for task in to_run.drain(..) {
            self.pool.execute(task);
        }
        Ok(())
    }

    /// Sets the per-host concurrency limit. Must be `>= 1`. Promotes queued calls if the new
    /// limit opens capacity.
    pub fn set_max_requests_per_host(&self, max_requests_per_host: usize) -> Result<(), DispatchError> {
        let mut to_run;
        {
            let mut state = self.state.lock().unwrap();
            DispatcherLimits::validate(state.limits.max_requests, max_requests_per_host)?;
            state.limits.max_requests_per_host = max_requests_per_host;
            to_run = Self::promote_locked(&mut state);
        }
        for task in to_run.drain(..) {
            self.pool.execute(task);
        }
        Ok(())
    }

    /// Replaces the idle callback. `None` removes it. The callback runs after the lock is
    /// released, on whichever thread caused the transition to idle — never assume a specific
    /// thread.
    pub fn set_idle_callback<F>(&self, callback: Option<F>)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let boxed: Option<Arc<dyn Fn() + Send + Sync>> =
            callback.map(|f| Arc::new(f) as Arc<dyn Fn() + Send + Sync>);
        self.state.lock().unwrap().idle_callback = boxed;
    }

    /// Snapshot of calls currently waiting in `ready`.
    pub fn queued_calls(&self) -> Vec<Arc<dyn Call>> {
        self.state.lock().unwrap().ready.iter().map(|e| Arc::clone(&e.call)).collect()
    }

    /// Snapshot of calls currently running, both async and sync.
    pub fn running_calls(&self) -> Vec<Arc<dyn Call>> {
        let state = self.state.lock().unwrap();
        state
            .running_async
            .iter()
            .chain(state.running_sync.iter())
            .cloned()
            .collect()
    }

    /// Number of calls currently waiting in `ready`.
    pub fn queued_calls_count(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    /// Number of calls currently running, both async and sync.
    pub fn running_calls_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.running_async.len() + state.running_sync.len()
    }

    /// The worker pool handle backing this dispatcher, for embedders that want to inspect or
    /// reuse it directly.
    pub fn executor_handle(&self) -> Arc<dyn WorkerPool> {
        Arc::clone(&self.pool)
    }

    fn fire_idle(&self) {
        let callback = self.state.lock().unwrap().idle_callback.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Shifts eligible calls from `ready` to `running_async`, in FIFO order, skipping (but not
    /// removing) calls whose host is still saturated — they may be leapfrogged by later calls
    /// to other hosts. Returns the tasks to submit to the pool once the lock is released.
    fn promote_locked(state: &mut State) -> Vec<BoxedTask> {
        let mut to_run = Vec::new();
        if state.running_async.len() >= state.limits.max_requests {
            return to_run;
        }

        let mut i = 0;
        while i < state.ready.len() {
            if state.running_async.len() >= state.limits.max_requests {
                break;
            }
            let host_count = running_count_for_host(&state.running_async, state.ready[i].call.host());
            if host_count < state.limits.max_requests_per_host {
                let entry = state.ready.remove(i).expect("index was just checked in range");
                state.running_async.push(Arc::clone(&entry.call));
                to_run.push(entry.task);
            } else {
                i += 1;
            }
        }
        to_run
    }
}

fn running_count_for_host(running: &[Arc<dyn Call>], host: &str) -> usize {
    running.iter().filter(|c| c.host() == host).count()
}

/// Builder for [`Dispatcher`], mirroring the limits-then-build pattern used throughout this
/// crate's configuration types.
pub struct DispatcherBuilder {
    limits: Option<DispatcherLimits>,
    pool: Option<Arc<dyn WorkerPool>>,
}

impl DispatcherBuilder {
    /// Overrides the default concurrency limits.
    pub fn limits(mut self, limits: DispatcherLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Overrides the default worker pool. Must be able to run at least `limits.max_requests`
    /// tasks concurrently for the limits to be meaningful.
    pub fn worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validates the limits and constructs the dispatcher.
    pub fn build(self) -> Result<Arc<Dispatcher>, DispatchError> {
        let limits = self.limits.unwrap_or_default();
        DispatcherLimits::validate(limits.max_requests, limits.max_requests_per_host)?;

        Ok(Arc::new(Dispatcher {
            state: Mutex::new(State {
                ready: VecDeque::new(),
                running_async: Vec::new(),
                running_sync: Vec::new(),
                limits,
                idle_callback: None,
            }),
            pool: self.pool.unwrap_or_else(pool::default_pool),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher_with(limits: DispatcherLimits, pool: Arc<ManualWorkerPool>) -> Arc<Dispatcher> {
        Dispatcher::builder()
            .limits(limits)
            .worker_pool(pool as Arc<dyn WorkerPool>)
            .build()
            .unwrap()
    }

    /// Spec §8 scenario 1: host cap.
    #[test]
    fn host_cap_admits_two_and_queues_the_rest() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(
            DispatcherLimits {
                max_requests: 10,
                max_requests_per_host: 2,
                _priv: (),
            },
            Arc::clone(&pool),
        );

        for _ in 0..5 {
            dispatcher.enqueue(Arc::new(SimpleCall::new("a")), || {});
        }
        dispatcher.enqueue(Arc::new(SimpleCall::new("b")), || {});

        assert_eq!(dispatcher.running_calls_count(), 3);
        assert_eq!(dispatcher.queued_calls_count(), 3);
        assert_eq!(pool.pending_count(), 3);

        assert!(pool.run_next());
        assert_eq!(dispatcher.running_calls_count(), 3);
        assert_eq!(dispatcher.queued_calls_count(), 2);
    }

    /// Spec §8 scenario 2: fair bypass — a later call to a free host is admitted ahead of an
    /// earlier call to a saturated host.
    #[test]
    fn fair_bypass_admits_later_call_to_free_host() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(
            DispatcherLimits {
                max_requests: 10,
                max_requests_per_host: 1,
                _priv: (),
            },
            Arc::clone(&pool),
        );

        let a1 = Arc::new(SimpleCall::new("a"));
        let a2 = Arc::new(SimpleCall::new("a"));
        let b = Arc::new(SimpleCall::new("b"));

        dispatcher.enqueue(a1, || {});
        dispatcher.enqueue(a2, || {});
        dispatcher.enqueue(b, || {});

        assert_eq!(dispatcher.running_calls_count(), 2);
        assert_eq!(dispatcher.queued_calls_count(), 1);

        let running_hosts: Vec<String> = dispatcher.running_calls().iter().map(|c| c.host().to_string()).collect();
        assert!(running_hosts.contains(&"a".to_string()));
        assert!(running_hosts.contains(&"b".to_string()));
    }

    #[test]
    fn promotion_respects_fifo_for_unconstrained_single_host() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(
            DispatcherLimits {
                max_requests: 1,
                max_requests_per_host: 10,
                _priv: (),
            },
            Arc::clone(&pool),
        );

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = Arc::clone(&order);
            dispatcher.enqueue(Arc::new(SimpleCall::new("a")), move || {
                order.lock().unwrap().push(i);
            });
        }

        assert_eq!(dispatcher.running_calls_count(), 1);
        assert_eq!(dispatcher.queued_calls_count(), 3);

        pool.run_all();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn idle_callback_fires_exactly_once_on_transition_to_zero() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(DispatcherLimits::default(), Arc::clone(&pool));

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        dispatcher.set_idle_callback(Some(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        dispatcher.enqueue(Arc::new(SimpleCall::new("a")), || {});
        dispatcher.enqueue(Arc::new(SimpleCall::new("b")), || {});
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        pool.run_all();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.running_calls_count(), 0);
    }

    #[test]
    fn set_max_requests_rejects_zero() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(DispatcherLimits::default(), pool);
        assert!(dispatcher.set_max_requests(0).is_err());
        assert!(dispatcher.set_max_requests_per_host(0).is_err());
    }

    #[test]
    #[should_panic(expected = "not tracked as running")]
    fn finish_async_on_untracked_call_panics() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(DispatcherLimits::default(), pool);
        let call: Arc<dyn Call> = Arc::new(SimpleCall::new("a"));
        dispatcher.finish_async(&call);
    }

    #[test]
    fn cancel_all_marks_every_queue() {
        let pool = Arc::new(ManualWorkerPool::new());
        let dispatcher = dispatcher_with(
            DispatcherLimits {
                max_requests: 1,
                max_requests_per_host: 1,
                _priv: (),
            },
            pool,
        );

        let running = Arc::new(SimpleCall::new("a"));
        let queued = Arc::new(SimpleCall::new("a"));
        dispatcher.enqueue(Arc::clone(&running) as Arc<dyn Call>, || {});
        dispatcher.enqueue(Arc::clone(&queued) as Arc<dyn Call>, || {});

        dispatcher.cancel_all();
        assert!(running.is_cancelled());
        assert!(queued.is_cancelled());
    }

    proptest::proptest! {
        /// §8 dispatcher invariant: for any sequence of admissions, running calls never exceed
        /// either limit, at any point a snapshot is taken.
        #[test]
        fn never_exceeds_limits(
            max_requests in 1usize..6,
            max_requests_per_host in 1usize..4,
            hosts in proptest::collection::vec(0usize..3, 0..30),
        ) {
            let pool = Arc::new(ManualWorkerPool::new());
            let dispatcher = dispatcher_with(
                DispatcherLimits { max_requests, max_requests_per_host, _priv: () },
                Arc::clone(&pool),
            );

            for h in hosts {
                dispatcher.enqueue(Arc::new(SimpleCall::new(format!("host-{h}"))), || {});
                assert!(dispatcher.running_calls_count() <= max_requests);

                for call in dispatcher.running_calls() {
                    let count = dispatcher
                        .running_calls()
                        .iter()
                        .filter(|c| c.host() == call.host())
                        .count();
                    assert!(count <= max_requests_per_host);
                }

                // Occasionally drain one running call to exercise promotion too.
                if pool.pending_count() > 0 && pool.run_next() {
                    assert!(dispatcher.running_calls_count() <= max_requests);
                }
            }
        }
    }
}
