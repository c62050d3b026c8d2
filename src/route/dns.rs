//! The DNS collaborator: resolves a host to an ordered list of addresses.
//!
//! The resolution *algorithm* (which nameservers, caching, happy-eyeballs ordering) is explicitly
//! out of scope for this crate — see the crate-level non-goals. What the route selector needs is
//! only the seam: given a host, produce addresses in an order worth respecting (mixed IPv4/IPv6
//! environments rely on the resolver's own ordering, not ours).

use crate::error::DnsError;
use std::net::{IpAddr, ToSocketAddrs};

/// Resolves a hostname to an ordered list of IP addresses.
///
/// Order is preserved end to end: [`crate::route::RouteSelector`] emits one route per address in
/// exactly the order `lookup` returns them.
pub trait Dns: Send + Sync + 'static {
    /// Resolves `host` to its addresses. Must return at least one address on success.
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, DnsError>;
}

/// [`Dns`] backed by the system resolver via [`std::net::ToSocketAddrs`].
///
/// Mirrors whatever getaddrinfo()-equivalent order the platform resolver returns; this crate
/// does not reorder or deduplicate it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDns;

impl Dns for SystemDns {
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let addrs: Vec<IpAddr> = (host, 0u16)
            .to_socket_addrs()?
            .map(|addr| addr.ip())
            .collect();
        if addrs.is_empty() {
            return Err(DnsError::NoAddresses);
        }
        Ok(addrs)
    }
}


#[cfg(test)]
pub(crate) use tests::StubDns;
