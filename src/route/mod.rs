//! Enumerates connection attempts for a target [`Address`].
//!
//! A [`RouteSelector`] walks the cross-product of proxies × resolved socket addresses for one
//! address, in order, deferring routes already known to be bad (per [`RouteDatabase`]) to the
//! tail of the search. One instance is created per connection attempt and discarded once
//! exhausted — it is not reused across attempts.

pub mod database;
pub mod dns;

pub use database::{InMemoryRouteDatabase, RouteDatabase};
pub use dns::{Dns, SystemDns};

use crate::error::{ConnectError, RouteError};
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::Arc,
};
use url::Url;

/// Target identity for a connection attempt: scheme, host, port, and the collaborators needed
/// to turn that into concrete routes (a DNS resolver, and optionally a proxy selector or a fixed
/// proxy override).
#[derive(Clone)]
pub struct Address {
    url: Url,
    dns: Arc<dyn Dns>,
    proxy_selector: Option<Arc<dyn ProxySelector>>,
    proxy: Option<Proxy>,
}

impl Address {
    /// Builds an address from a parsed URL and DNS collaborator, with no proxy configuration
    /// (every route for it will be direct).
    pub fn new(url: Url, dns: Arc<dyn Dns>) -> Self {
        Self {
            url,
            dns,
            proxy_selector: None,
            proxy: None,
        }
    }

    /// Convenience constructor for an `http://host:port/` address backed by [`SystemDns`]. Handy
    /// for tests and simple embedders; production clients will usually go through [`Address::new`]
    /// with their own resolver.
    pub fn direct(host: impl AsRef<str>, port: u16) -> Self {
        let url = Url::parse(&format!("http://{}:{}/", host.as_ref(), port)).expect("host/port always form a valid authority");
        Self::new(url, Arc::new(SystemDns))
    }

    /// Installs a proxy selector consulted when no fixed proxy is set.
    pub fn with_proxy_selector(mut self, selector: Arc<dyn ProxySelector>) -> Self {
        self.proxy_selector = Some(selector);
        self
    }

    /// Pins this address to a single proxy, bypassing [`ProxySelector`] entirely — even if the
    /// pinned value is [`Proxy::NoProxy`].
    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// The target host, as it appears in the URL's authority.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// The target port, falling back to the scheme's default (`80`/`443`) when unspecified.
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// The full target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// A proxy to dial through, or the absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Proxy {
    /// Connect directly to the target; no intermediate hop.
    NoProxy,
    /// An HTTP CONNECT proxy, resolved via DNS like any direct target.
    Http(ProxyTarget),
    /// A SOCKS proxy. Its own target is left unresolved: DNS for the final destination (and, per
    /// the SOCKS protocol, often the proxy's own hop too) is the proxy's responsibility, not
    /// ours.
    Socks(ProxyTarget),
}

impl Proxy {
    /// Builds an HTTP proxy from an already-known `host`/`port` pair.
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Proxy::Http(ProxyTarget { host: host.into(), port })
    }

    /// Builds a SOCKS proxy from an already-known `host`/`port` pair.
    pub fn socks(host: impl Into<String>, port: u16) -> Self {
        Proxy::Socks(ProxyTarget { host: host.into(), port })
    }

    /// Parses an HTTP proxy from a `host:port` authority string, as might come from a config
    /// file. Fails with [`RouteError::InvalidProxyAddress`] if the string isn't of the expected
    /// `host:port` shape — the Rust analogue of the source's "proxy address not the expected
    /// concrete type" failure, since our enum variants can't be malformed once constructed.
    pub fn http_from_authority(authority: &str) -> Result<Self, RouteError> {
        Ok(Proxy::Http(ProxyTarget::parse(authority)?))
    }
}

/// A `host:port` pair identifying a proxy's own address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyTarget {
    /// The proxy's hostname or literal IP.
    pub host: String,
    /// The proxy's port.
    pub port: u16,
}

impl ProxyTarget {
    fn parse(authority: &str) -> Result<Self, RouteError> {
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| RouteError::InvalidProxyAddress(authority.to_string()))?;
        if host.is_empty() {
            return Err(RouteError::InvalidProxyAddress(authority.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| RouteError::InvalidProxyAddress(authority.to_string()))?;
        Ok(Self { host: host.to_string(), port })
    }
}

/// The socket-level hop of a [`Route`]: either a resolved IP:port, or (for SOCKS proxies) a
/// host:port pair left for the proxy itself to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketTarget {
    /// A DNS-resolved address, ready to `connect()` to directly.
    Resolved(SocketAddr),
    /// An unresolved `host:port`, to be handed to a SOCKS proxy as-is.
    Unresolved {
        /// The unresolved hostname.
        host: String,
        /// The port to connect to.
        port: u16,
    },
}

impl From<SocketAddr> for SocketTarget {
    fn from(addr: SocketAddr) -> Self {
        SocketTarget::Resolved(addr)
    }
}

/// A concrete connection attempt: the target identity, the proxy to go through, and the
/// socket-level hop to dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    host: String,
    port: u16,
    proxy: Proxy,
    target: SocketTarget,
}

impl Route {
    /// Builds a route. `address` is read for its host/port identity at construction time; the
    /// route itself doesn't hold a live reference back to it.
    pub fn new(address: &Address, proxy: Proxy, target: impl Into<SocketTarget>) -> Self {
        Self {
            host: address.host().to_string(),
            port: address.port(),
            proxy,
            target: target.into(),
        }
    }

    /// The target host this route ultimately reaches.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The target port this route ultimately reaches.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The proxy this route dials through.
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The socket-level hop: resolved IP:port, or an unresolved host:port for a SOCKS proxy.
    pub fn target(&self) -> &SocketTarget {
        &self.target
    }
}

/// Selects proxies for a [`Url`], and is notified when a connection through one fails.
///
/// An external collaborator — e.g. respecting the platform's system proxy configuration or
/// `HTTP_PROXY`/`NO_PROXY` environment variables. This crate only calls it; it never inspects or
/// mutates proxy configuration itself.
pub trait ProxySelector: Send + Sync + 'static {
    /// Returns the proxies to try for `url`, in order. `None` or an empty list both mean "defer
    /// to the no-proxy fallback".
    fn select(&self, url: &Url) -> Option<Vec<Proxy>>;

    /// Notifies the selector that a connection through `proxy` failed, so it can adjust future
    /// selections (e.g. deprioritizing a flaky proxy).
    fn connect_failed(&self, url: &Url, proxy: &Proxy, err: &ConnectError);
}

/// Enumerates routes for one [`Address`], deferring previously-failed routes to the tail.
///
/// Single-threaded and single-use: created for one connection attempt, discarded once
/// exhausted. Call [`RouteSelector::next`] in a loop (guarded by [`RouteSelector::has_next`])
/// until a connection succeeds or the selector is exhausted.
pub struct RouteSelector {
    address: Address,
    route_database: Arc<dyn RouteDatabase>,
    proxies: Vec<Proxy>,
    next_proxy_index: usize,
    pending_proxy: Option<Proxy>,
    current_targets: Vec<SocketTarget>,
    next_target_index: usize,
    postponed_routes: VecDeque<Route>,
}

impl RouteSelector {
    /// Creates a selector for `address`, computing its proxy list up front (`reset_next_proxy`
    /// in the spec's terms): a pinned proxy if set, else the proxy selector's result, else a
    /// direct fallback. Every address yields at least one route.
    pub fn new(address: Address, route_database: Arc<dyn RouteDatabase>) -> Self {
        let proxies = Self::compute_proxies(&address);
        Self {
            address,
            route_database,
            proxies,
            next_proxy_index: 0,
            pending_proxy: None,
            current_targets: Vec::new(),
            next_target_index: 0,
            postponed_routes: VecDeque::new(),
        }
    }

    fn compute_proxies(address: &Address) -> Vec<Proxy> {
        if let Some(proxy) = &address.proxy {
            return vec![proxy.clone()];
        }
        if let Some(selector) = &address.proxy_selector {
            if let Some(list) = selector.select(&address.url) {
                if !list.is_empty() {
                    return list;
                }
            }
        }
        vec![Proxy::NoProxy]
    }

    fn has_next_target(&self) -> bool {
        self.next_target_index < self.current_targets.len()
    }

    fn has_next_proxy(&self) -> bool {
        self.next_proxy_index < self.proxies.len()
    }

    /// Whether a further call to [`RouteSelector::next`] would succeed.
    pub fn has_next(&self) -> bool {
        self.has_next_target() || self.has_next_proxy() || !self.postponed_routes.is_empty()
    }

    /// Produces the next route to attempt, or [`RouteError::NoSuchElement`] once exhausted.
    ///
    /// Expressed as a bounded loop rather than the source's self-recursion (see the crate's
    /// design notes on postponed-route recursion): each iteration either advances to the next
    /// socket target, advances to the next proxy (resolving its targets), or drains one
    /// postponed route, so the loop terminates in at most
    /// `proxies + targets + postponed_routes` steps.
    pub fn next(&mut self) -> Result<Route, RouteError> {
        loop {
            if self.has_next_target() {
                let target = self.current_targets[self.next_target_index].clone();
                self.next_target_index += 1;
                let route = Route::new(&self.address, self.current_proxy().clone(), target);
                if self.route_database.should_postpone(&route) {
                    tracing::trace!(host = route.host(), "postponing previously-failed route");
                    self.postponed_routes.push_back(route);
                    continue;
                }
                tracing::debug!(host = route.host(), "selected route");
                return Ok(route);
            }

            if self.has_next_proxy() {
                let proxy = self.proxies[self.next_proxy_index].clone();
                self.next_proxy_index += 1;
                self.current_targets = self.resolve_targets(&proxy)?;
                self.next_target_index = 0;
                self.pending_proxy = Some(proxy);
                continue;
            }

            if let Some(route) = self.postponed_routes.pop_front() {
                tracing::debug!(host = route.host(), "draining postponed route");
                return Ok(route);
            }

            return Err(RouteError::NoSuchElement);
        }
    }

    fn current_proxy(&self) -> &Proxy {
        self.pending_proxy.as_ref().expect("a proxy is always selected before its targets are enumerated")
    }

    fn resolve_targets(&self, proxy: &Proxy) -> Result<Vec<SocketTarget>, RouteError> {
        match proxy {
            Proxy::NoProxy => {
                let port = self.address.port();
                validate_port(port)?;
                let host = self.address.host();
                let ips = self
                    .address
                    .dns
                    .lookup(host)
                    .map_err(|source| RouteError::Dns { host: host.to_string(), source })?;
                Ok(ips.into_iter().map(|ip| SocketTarget::Resolved(SocketAddr::new(ip, port))).collect())
            }
            Proxy::Socks(target) => {
                validate_port(target.port)?;
                Ok(vec![SocketTarget::Unresolved { host: target.host.clone(), port: target.port }])
            }
            Proxy::Http(target) => {
                validate_port(target.port)?;
                let ips = self
                    .address
                    .dns
                    .lookup(&target.host)
                    .map_err(|source| RouteError::Dns { host: target.host.clone(), source })?;
                Ok(ips.into_iter().map(|ip| SocketTarget::Resolved(SocketAddr::new(ip, target.port))).collect())
            }
        }
    }

    /// Reports that a connection attempt on `route` failed. Notifies the proxy selector (if the
    /// route went through a proxy and one is configured) and always records the failure in the
    /// route database so future selection passes postpone it.
    pub fn connect_failed(&self, route: &Route, err: &ConnectError) {
        if !matches!(route.proxy(), Proxy::NoProxy) {
            if let Some(selector) = &self.address.proxy_selector {
                selector.connect_failed(&self.address.url, route.proxy(), err);
            }
        }
        self.route_database.failed(route);
    }
}

fn validate_port(port: u16) -> Result<(), RouteError> {
    if port == 0 {
        return Err(RouteError::InvalidPort(port as u32));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::dns::StubDns;

    struct EmptyProxySelector;
    impl ProxySelector for EmptyProxySelector {
        fn select(&self, _url: &Url) -> Option<Vec<Proxy>> {
            None
        }
        fn connect_failed(&self, _url: &Url, _proxy: &Proxy, _err: &ConnectError) {}
    }

    fn address_with(dns: Arc<StubDns>) -> Address {
        let url = Url::parse("http://x/").unwrap();
        Address::new(url, dns)
    }

    /// Spec §8 scenario 3.
    #[test]
    fn direct_address_emits_one_route_per_resolved_ip() {
        let dns = Arc::new(StubDns::new());
        let a: std::net::IpAddr = "1.1.1.1".parse().unwrap();
        let b: std::net::IpAddr = "2.2.2.2".parse().unwrap();
        dns.set("x", vec![a, b]);

        let address = address_with(Arc::clone(&dns));
        let db = Arc::new(InMemoryRouteDatabase::new());
        let mut selector = RouteSelector::new(address, db);

        assert!(selector.has_next());
        let r1 = selector.next().unwrap();
        assert_eq!(r1.proxy(), &Proxy::NoProxy);
        assert_eq!(r1.target(), &SocketTarget::Resolved(SocketAddr::new(a, 80)));

        let r2 = selector.next().unwrap();
        assert_eq!(r2.target(), &SocketTarget::Resolved(SocketAddr::new(b, 80)));

        assert!(!selector.has_next());
        assert!(matches!(selector.next(), Err(RouteError::NoSuchElement)));
    }

    #[test]
    fn postponed_routes_are_yielded_last() {
        let dns = Arc::new(StubDns::new());
        let a: std::net::IpAddr = "1.1.1.1".parse().unwrap();
        let b: std::net::IpAddr = "2.2.2.2".parse().unwrap();
        dns.set("x", vec![a, b]);

        let address = address_with(Arc::clone(&dns));
        let db = Arc::new(InMemoryRouteDatabase::new());
        // Mark the first address bad before the selector ever runs.
        let bad_route = Route::new(&address, Proxy::NoProxy, SocketAddr::new(a, 80));
        db.failed(&bad_route);

        let mut selector = RouteSelector::new(address, db);
        let first = selector.next().unwrap();
        assert_eq!(first.target(), &SocketTarget::Resolved(SocketAddr::new(b, 80)));

        let second = selector.next().unwrap();
        assert_eq!(second.target(), &SocketTarget::Resolved(SocketAddr::new(a, 80)));
        assert!(!selector.has_next());
    }

    #[test]
    fn fixed_proxy_overrides_selector() {
        let dns = Arc::new(StubDns::new());
        let url = Url::parse("http://x/").unwrap();
        let address = Address::new(url, dns)
            .with_proxy_selector(Arc::new(EmptyProxySelector))
            .with_proxy(Proxy::socks("proxy.example", 1080));

        let db = Arc::new(InMemoryRouteDatabase::new());
        let mut selector = RouteSelector::new(address, db);
        let route = selector.next().unwrap();
        assert_eq!(
            route.target(),
            &SocketTarget::Unresolved { host: "proxy.example".to_string(), port: 1080 }
        );
        assert!(!selector.has_next());
    }

    #[test]
    fn http_proxy_authority_parse_rejects_malformed_input() {
        assert!(Proxy::http_from_authority("no-port").is_err());
        assert!(Proxy::http_from_authority(":1080").is_err());
        assert!(Proxy::http_from_authority("proxy.example:1080").is_ok());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let dns = Arc::new(StubDns::new());
        let url = Url::parse("http://x/").unwrap();
        let address = Address::new(url, dns).with_proxy(Proxy::http("proxy.example", 0));
        let db = Arc::new(InMemoryRouteDatabase::new());
        let mut selector = RouteSelector::new(address, db);
        assert!(matches!(selector.next(), Err(RouteError::InvalidPort(0))));
    }

    proptest::proptest! {
        /// §8 postponement property: for any arbitrary subset of routes pre-marked bad in the
        /// route database, every route in that subset is yielded only after all routes outside
        /// it, regardless of which indices were picked.
        #[test]
        fn postponed_routes_always_drain_last(
            n in 1usize..8,
            bad_flags in proptest::collection::vec(proptest::prelude::any::<bool>(), 1..8),
        ) {
            let mut bad_flags = bad_flags;
            bad_flags.resize(n, false);

            let dns = Arc::new(StubDns::new());
            let ips: Vec<std::net::IpAddr> = (0..n).map(|i| std::net::IpAddr::from([10, 0, 0, i as u8])).collect();
            dns.set("x", ips.clone());

            let address = address_with(Arc::clone(&dns));
            let db = Arc::new(InMemoryRouteDatabase::new());
            for (i, bad) in bad_flags.iter().enumerate() {
                if *bad {
                    let route = Route::new(&address, Proxy::NoProxy, SocketAddr::new(ips[i], 80));
                    db.failed(&route);
                }
            }

            let mut selector = RouteSelector::new(address, db);
            let mut seen_postponed = false;
            while selector.has_next() {
                let route = selector.next().unwrap();
                let target_ip = match route.target() {
                    SocketTarget::Resolved(addr) => addr.ip(),
                    SocketTarget::Unresolved { .. } => panic!("direct address should only produce resolved targets"),
                };
                let idx = ips.iter().position(|ip| *ip == target_ip).unwrap();
                if bad_flags[idx] {
                    seen_postponed = true;
                } else {
                    assert!(!seen_postponed, "non-postponed route {idx} was yielded after a postponed one");
                }
            }
            assert!(matches!(selector.next(), Err(RouteError::NoSuchElement)));
        }
    }
}
