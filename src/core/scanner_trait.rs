// Core trait definitions for the probe layer
// The chunk engine only talks to these, so tests can swap in scripted doubles

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Outcome of a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Refused,
    TimedOut,
    Unreachable,
}

impl ConnectOutcome {
    /// Refused, filtered and timed-out all count as not reachable
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectOutcome::Connected)
    }
}

/// Reachability check for one (address, port) pair
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Attempt a TCP connection, bounded by `timeout`
    async fn connect(&self, target: Ipv4Addr, port: u16, timeout: Duration) -> ConnectOutcome;

    /// Get scanner name
    fn name(&self) -> &str;
}

/// Reverse DNS lookup for one address
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns the PTR name, or `None` when there is none or the lookup
    /// failed. Implementations must not return the address literal itself.
    async fn reverse_lookup(&self, target: Ipv4Addr, timeout: Duration) -> Option<String>;

    fn name(&self) -> &str;
}
