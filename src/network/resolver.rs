//! Reverse DNS resolution

use crate::core::NameResolver;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default cap on `getnameinfo` calls occupying blocking-pool threads
pub const DEFAULT_MAX_BLOCKING_LOOKUPS: usize = 32;

/// Resolver backed by the system's `getnameinfo`.
///
/// A lookup that outlives its timeout keeps running on the blocking pool
/// and keeps its slot until it returns, so at most `max_lookups` blocking
/// threads are ever tied up by slow resolvers.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    slots: Arc<Semaphore>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BLOCKING_LOOKUPS)
    }

    pub fn with_limit(max_lookups: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_lookups.max(1))),
        }
    }

    /// Slots not held by a running lookup
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn reverse_lookup(&self, target: Ipv4Addr, timeout: Duration) -> Option<String> {
        let ip = IpAddr::V4(target);
        let slots = self.slots.clone();
        let lookup = async move {
            let slot = slots.acquire_owned().await.ok()?;
            let task = tokio::task::spawn_blocking(move || {
                let _slot = slot;
                dns_lookup::lookup_addr(&ip)
            });
            Some(task.await)
        };

        // Waiting for a slot counts against the timeout too
        let name = match tokio::time::timeout(timeout, lookup).await {
            Ok(Some(Ok(Ok(name)))) => name,
            Ok(Some(Ok(Err(e)))) => {
                log::debug!("reverse lookup for {} failed: {}", target, e);
                return None;
            }
            Ok(Some(Err(e))) => {
                log::warn!("reverse lookup task for {} panicked: {}", target, e);
                return None;
            }
            Ok(None) => return None,
            Err(_) => {
                log::debug!("reverse lookup for {} timed out", target);
                return None;
            }
        };

        // getnameinfo hands back the literal when there is no PTR record
        if name.is_empty() || name == target.to_string() {
            None
        } else {
            Some(name)
        }
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Resolver that never looks anything up
#[derive(Debug, Clone, Default)]
pub struct NoopResolver;

#[async_trait]
impl NameResolver for NoopResolver {
    async fn reverse_lookup(&self, _target: Ipv4Addr, _timeout: Duration) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Address-keyed name cache.
///
/// Filled once per distinct address and read for every port of that
/// address, so N ports cost one lookup instead of N.
#[derive(Debug, Clone, Default)]
pub struct NameCache {
    names: HashMap<Ipv4Addr, Option<String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every address not cached yet.
    ///
    /// Each lookup holds one of `permits` while it runs, so callers can share
    /// a single in-flight budget between lookups and other work.
    pub async fn fill(
        &mut self,
        resolver: Arc<dyn NameResolver>,
        addresses: &[Ipv4Addr],
        timeout: Duration,
        permits: &Semaphore,
    ) {
        let mut missing: Vec<Ipv4Addr> = addresses
            .iter()
            .copied()
            .filter(|addr| !self.names.contains_key(addr))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        let width = missing.len().max(1);

        let resolved: Vec<(Ipv4Addr, Option<String>)> = stream::iter(missing)
            .map(|addr| {
                let resolver = resolver.clone();
                async move {
                    // Acquire only fails once the semaphore is closed, which never happens here
                    let _permit = permits.acquire().await.ok();
                    (addr, resolver.reverse_lookup(addr, timeout).await)
                }
            })
            .buffer_unordered(width)
            .collect()
            .await;

        self.names.extend(resolved);
    }

    /// Cached name; `None` for unresolved or unknown addresses
    pub fn get(&self, address: &Ipv4Addr) -> Option<&str> {
        self.names.get(address).and_then(|name| name.as_deref())
    }

    pub fn contains(&self, address: &Ipv4Addr) -> bool {
        self.names.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
