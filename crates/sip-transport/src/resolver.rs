//! Host name to socket address resolution

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Turns a host and port into candidate destinations, in preference order
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;
}

/// Parses IP literals, including bracketed IPv6 references
fn literal(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[').trim_end_matches(']').parse().ok()
}

/// Resolver backed by the system resolver through tokio
#[derive(Debug, Default, Clone)]
pub struct DnsResolver;

impl DnsResolver {
    pub fn new() -> Self {
        DnsResolver
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if let Some(ip) = literal(host) {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| {
                warn!(host, error = %e, "DNS lookup failed");
                Error::Resolution(format!("{}: {}", host, e))
            })?
            .collect();

        if candidates.is_empty() {
            return Err(Error::NoCandidates(host.to_string()));
        }
        debug!(host, count = candidates.len(), "Resolved host");
        Ok(candidates)
    }
}

/// Resolver with a fixed host table, for tests and static deployments
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: RwLock<HashMap<String, Vec<IpAddr>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address for `host`; lookups are case-insensitive
    pub fn insert(&self, host: &str, address: IpAddr) {
        self.entries
            .write()
            .entry(host.to_ascii_lowercase())
            .or_default()
            .push(address);
    }

    pub fn with_entry(self, host: &str, address: IpAddr) -> Self {
        self.insert(host, address);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if let Some(ip) = literal(host) {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        match self.entries.read().get(&host.to_ascii_lowercase()) {
            Some(addresses) if !addresses.is_empty() => Ok(addresses
                .iter()
                .map(|ip| SocketAddr::new(*ip, port))
                .collect()),
            _ => Err(Error::NoCandidates(host.to_string())),
        }
    }
}
