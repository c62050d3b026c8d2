//! The `RouteDatabase` collaborator: remembers which routes have recently failed.
//!
//! Shared process-wide (typically one per client, alongside the [`crate::dispatcher::Dispatcher`]
//! it lives next to). The selector never clears an entry itself; it only asks and reports.

use crate::route::Route;
use std::{
    collections::HashSet,
    sync::Mutex,
};

/// Tracks routes known to have failed recently, so future selection passes can postpone them.
pub trait RouteDatabase: Send + Sync + 'static {
    /// Whether `route` should be deferred to the tail of the search order.
    fn should_postpone(&self, route: &Route) -> bool;

    /// Records that a connection attempt on `route` failed.
    fn failed(&self, route: &Route);
}

/// In-process [`RouteDatabase`] backed by a `HashSet`, suitable for a single client instance.
#[derive(Default)]
pub struct InMemoryRouteDatabase {
    failed: Mutex<HashSet<Route>>,
}

impl InMemoryRouteDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every recorded failure. Not part of the external-interface contract in the spec,
    /// but useful for long-lived clients that want to periodically give previously-bad routes
    /// another chance (mirrors what a connection pool's own eviction policy might trigger).
    pub fn clear(&self) {
        self.failed.lock().unwrap().clear();
    }
}

impl RouteDatabase for InMemoryRouteDatabase {
    fn should_postpone(&self, route: &Route) -> bool {
        self.failed.lock().unwrap().contains(route)
    }

    fn failed(&self, route: &Route) {
        self.failed.lock().unwrap().insert(route.clone());
    }
}
