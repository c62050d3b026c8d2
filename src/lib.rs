//! reqcore - dispatch and cache-decision engine for an HTTP/1.1+HTTPS client
//!
//! A focused library implementing the three hardest-to-get-right pieces of an HTTP client's
//! core, leaving wire I/O, TLS, connection pooling, and the codec itself to the embedder:
//!
//! - [`dispatcher`] — a concurrency coordinator enforcing global and per-host parallelism limits
//!   across asynchronous calls, admitting work to a [`dispatcher::WorkerPool`], and signaling
//!   idleness.
//! - [`route`] — a state machine enumerating connection attempts for a target [`route::Address`],
//!   walking proxy × resolved-address combinations and deferring previously-failed routes to the
//!   tail of the search.
//! - [`cache`] — a pure function over `(clock, request, cached response)` deciding whether to
//!   serve from cache, revalidate conditionally, or bypass the cache, faithful to RFC 7234.
//!
//! # Non-goals
//!
//! HTTP/2 multiplexing, on-disk cache persistence, the DNS resolution algorithm itself,
//! certificate validation, and byte-level wire framing are out of scope: this crate only
//! decides *which* call runs, *which* route to dial, and *whether* a cached response may be
//! served, leaving how those decisions get carried out to collaborator traits
//! ([`dispatcher::WorkerPool`], [`route::Dns`], [`route::ProxySelector`], [`route::RouteDatabase`]).
//!
//! # Quick start
//!
//! ```
//! use reqcore::dispatcher::{Dispatcher, SimpleCall};
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new();
//! let call = Arc::new(SimpleCall::new("example.com"));
//! dispatcher.enqueue(call, || {
//!     // perform the request, then the dispatcher is notified automatically
//! });
//! ```

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod route;

pub use crate::{
    cache::{CacheControl, CacheStrategy, CachedResponse},
    config::DispatcherLimits,
    dispatcher::Dispatcher,
    error::{ConnectError, DispatchError, DnsError, RouteError},
    route::{Address, Proxy, Route, RouteSelector},
};
