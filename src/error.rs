//! Error types for the dispatcher, route selector, and cache strategy resolver.
//!
//! Each module gets its own enum, one variant per distinct failure mode, following the
//! house style of having no catch-all variant: a new failure mode must be named explicitly
//! rather than folded into a generic "other" bucket.

use std::{fmt, io};

/// Errors raised while configuring or operating the [`crate::dispatcher::Dispatcher`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// `max_requests` or `max_requests_per_host` was set below `1`.
    #[error("limit must be >= 1, got {value}")]
    InvalidConfiguration {
        /// The rejected value.
        value: usize,
    },
}

/// Errors raised while enumerating routes for an [`crate::route::Address`].
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The configured proxy's socket address was not of the expected concrete shape
    /// (e.g. an HTTP proxy without a resolvable `host:port`).
    #[error("proxy address is not a usable socket address: {0}")]
    InvalidProxyAddress(String),

    /// A resolved port fell outside `[1, 65535]`.
    #[error("port {0} is out of range")]
    InvalidPort(u32),

    /// `next()` was called after the selector was exhausted.
    #[error("no more routes to try")]
    NoSuchElement,

    /// DNS resolution for a host failed.
    #[error("dns lookup for {host} failed: {source}")]
    Dns {
        /// The host that failed to resolve.
        host: String,
        /// The underlying resolution error.
        #[source]
        source: DnsError,
    },
}

/// Errors raised by a [`crate::route::Dns`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    /// The resolver's own I/O failed (e.g. no route to the configured nameserver).
    #[error("dns resolution failed: {0}")]
    Io(#[from] io::Error),

    /// The host resolved to zero addresses.
    #[error("host resolved to no addresses")]
    NoAddresses,
}

/// Transport-level failure reported back into a route selector via `connect_failed`.
///
/// Intentionally opaque beyond a `Display` message: the selector only needs to record that
/// the attempt failed, not to interpret the I/O error itself.
#[derive(Debug)]
pub struct ConnectError(pub String);

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConnectError {}

impl From<io::Error> for ConnectError {
    fn from(err: io::Error) -> Self {
        ConnectError(err.to_string())
    }
}
