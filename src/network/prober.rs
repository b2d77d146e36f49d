//! Single-target probing: one connect attempt plus one reverse lookup

use crate::config::ScanConfig;
use crate::core::{NameResolver, PortScanner};
use crate::network::{server_name, NoopResolver, ProbeStatus, SystemResolver, TcpConnectScanner};
use crate::scanner::ProbeResult;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// Probes (address, port) pairs
#[derive(Clone)]
pub struct TargetProber {
    scanner: Arc<dyn PortScanner>,
    resolver: Arc<dyn NameResolver>,
    connect_timeout: Duration,
    resolve_timeout: Duration,
}

impl TargetProber {
    pub fn new(
        scanner: Arc<dyn PortScanner>,
        resolver: Arc<dyn NameResolver>,
        connect_timeout: Duration,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            scanner,
            resolver,
            connect_timeout,
            resolve_timeout,
        }
    }

    /// TCP connect scanner plus the system resolver (or none, if disabled)
    pub fn from_config(config: &ScanConfig) -> Self {
        let resolver: Arc<dyn NameResolver> = if config.resolve_names {
            Arc::new(SystemResolver::new())
        } else {
            Arc::new(NoopResolver)
        };

        Self::new(
            Arc::new(TcpConnectScanner::new()),
            resolver,
            config.timeout_duration(),
            config.resolve_timeout_duration(),
        )
    }

    pub fn resolver(&self) -> Arc<dyn NameResolver> {
        self.resolver.clone()
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }

    /// Probe one pair. The lookup runs whether or not the port is open.
    ///
    /// `ScanEngine` does not call this; it pairs `reachable` with a
    /// per-address `NameCache` so each address is looked up once per chunk.
    pub async fn probe(&self, address: Ipv4Addr, port: u16) -> ProbeResult {
        let (reachable, name) = tokio::join!(
            self.reachable(address, port),
            self.resolver.reverse_lookup(address, self.resolve_timeout),
        );

        ProbeResult::new(address, port, ProbeStatus::from_reachable(reachable), server_name(name.as_deref()))
    }

    /// Connect half of a probe only
    pub async fn reachable(&self, address: Ipv4Addr, port: u16) -> bool {
        let outcome = self.scanner.connect(address, port, self.connect_timeout).await;
        log::trace!("{}:{} -> {:?} ({})", address, port, outcome, self.scanner.name());
        outcome.is_open()
    }
}
