//! Dispatcher configuration.
//!
//! # Admission flow
//!
//! ```text
//!                            [-----------]
//!                            [ enqueue() ]
//!                            [-----------]
//!                                  ||
//!                                  \/
//! [-------------]   Yes   /----------------------\   No   [----------------]
//! [ Add to ready] <====== | running < max_requests | =====> [ running.push ]
//! [-------------]   &&    | && host below per-host |  &&   [ pool.execute ]
//!                  No      \----------------------/  Yes   [----------------]
//! ```
//!
//! Admission always succeeds logically — a call that cannot run immediately simply waits in
//! `ready` until `promote_calls` lets it through.

/// Concurrency limits applied by the [`crate::dispatcher::Dispatcher`].
///
/// # Examples
/// ```
/// use reqcore::config::DispatcherLimits;
///
/// let limits = DispatcherLimits {
///     max_requests_per_host: 10,
///     ..DispatcherLimits::default()
/// };
/// assert_eq!(limits.max_requests, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherLimits {
    /// Maximum number of asynchronous calls running at once, across all hosts
    /// (default: `64`).
    pub max_requests: usize,

    /// Maximum number of asynchronous calls running at once for any single host
    /// (default: `5`).
    pub max_requests_per_host: usize,

    #[doc(hidden)]
    pub _priv: (),
}

impl Default for DispatcherLimits {
    fn default() -> Self {
        Self {
            max_requests: 64,
            max_requests_per_host: 5,
            _priv: (),
        }
    }
}

impl DispatcherLimits {
    /// Validates both limits are `>= 1`. Called on construction and on every setter.
    pub(crate) fn validate(max_requests: usize, max_requests_per_host: usize) -> Result<(), crate::error::DispatchError> {
        if max_requests < 1 {
            return Err(crate::error::DispatchError::InvalidConfiguration { value: max_requests });
        }
        if max_requests_per_host < 1 {
            return Err(crate::error::DispatchError::InvalidConfiguration { value: max_requests_per_host });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let limits = DispatcherLimits::default();
        assert_eq!(limits.max_requests, 64);
        assert_eq!(limits.max_requests_per_host, 5);
    }

    #[test]
    fn validate_rejects_zero() {
        assert!(DispatcherLimits::validate(0, 5).is_err());
        assert!(DispatcherLimits::validate(5, 0).is_err());
        assert!(DispatcherLimits::validate(1, 1).is_ok());
    }
}
