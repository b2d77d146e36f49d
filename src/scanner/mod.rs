//! Scanner module: session model, chunk engine and result aggregation

pub mod engine;
pub mod session;

use crate::config::{ProgressMode, ScanConfig};
use crate::error::ScanResult;
use crate::network::ProbeStatus;
use crate::utils::address_parser::{AddressRange, ExpandedRange};
use crate::utils::port_parser::PortSet;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Instant;

pub use engine::ScanEngine;
pub use session::{ScanAggregator, ScanStatus};

/// Result of probing one (address, port) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(rename = "ip")]
    pub address: Ipv4Addr,
    pub port: u16,
    pub status: ProbeStatus,
    #[serde(rename = "server")]
    pub server_name: String,
}

impl ProbeResult {
    pub fn new(address: Ipv4Addr, port: u16, status: ProbeStatus, server_name: String) -> Self {
        Self {
            address,
            port,
            status,
            server_name,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status.is_open()
    }
}

/// One scan definition plus the caller-held cursor.
///
/// The engine never stores sessions; callers pass one in for every chunk and
/// advance it with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    range: ExpandedRange,
    ports: PortSet,
    cursor: u64,
}

impl ScanSession {
    pub fn new(range: ExpandedRange, ports: PortSet) -> Self {
        Self { range, ports, cursor: 0 }
    }

    /// Validate and expand a scan definition.
    ///
    /// Address validation happens before port parsing, so a bad address is
    /// reported even when the port list is also broken.
    pub fn parse(start: &str, end: &str, ports: &str, config: &ScanConfig) -> ScanResult<Self> {
        let range = AddressRange::parse(start, end)?;
        let ports = PortSet::parse(ports, config.port_policy)?;
        let expanded = range.expand(config.max_range_addresses)?;
        Ok(Self::new(expanded, ports))
    }

    /// Resume at `cursor` addresses into the range
    pub fn with_cursor(mut self, cursor: u64) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn range(&self) -> &ExpandedRange {
        &self.range
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn total_address_count(&self) -> u64 {
        self.range.len()
    }

    pub fn total_probe_count(&self) -> u64 {
        self.range.len() * self.ports.len() as u64
    }

    /// Addresses fully processed, never more than the range holds
    pub fn addresses_processed(&self) -> u64 {
        self.cursor.min(self.total_address_count())
    }

    pub fn is_complete(&self) -> bool {
        self.ports.is_empty() || self.cursor >= self.total_address_count()
    }

    /// Move the cursor forward; it never moves back
    pub(crate) fn advance_to(&mut self, cursor: u64) {
        self.cursor = self.cursor.max(cursor);
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// Results of one chunk invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResponse {
    /// Cursor the chunk started from
    pub cursor: u64,
    pub results: Vec<ProbeResult>,
    pub new_cursor: u64,
    pub complete: bool,
}

impl ChunkResponse {
    /// Response for a session with nothing (left) to probe
    pub fn finished(cursor: u64, total_addresses: u64) -> Self {
        let new_cursor = cursor.max(total_addresses);
        Self {
            cursor,
            results: Vec::new(),
            new_cursor,
            complete: true,
        }
    }
}

/// Caller-owned, append-only result list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccumulatedResults {
    results: Vec<ProbeResult>,
}

impl AccumulatedResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk's results, keeping their order
    pub fn append(&mut self, results: &[ProbeResult]) {
        self.results.extend_from_slice(results);
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn as_slice(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_reachable()).count()
    }
}

impl From<Vec<ProbeResult>> for AccumulatedResults {
    fn from(results: Vec<ProbeResult>) -> Self {
        Self { results }
    }
}

/// Scan progress tracking
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub addresses_processed: u64,
    pub total_addresses: u64,
    pub port_count: u64,
    pub mode: ProgressMode,
    pub start_time: Instant,
    /// Open results accumulated so far, across all merged chunks
    pub open_found: usize,
}

impl ScanProgress {
    pub fn new(session: &ScanSession, mode: ProgressMode, start_time: Instant) -> Self {
        Self {
            addresses_processed: session.addresses_processed(),
            total_addresses: session.total_address_count(),
            port_count: session.ports().len() as u64,
            mode,
            start_time,
            open_found: 0,
        }
    }

    pub fn probes_completed(&self) -> u64 {
        self.addresses_processed * self.port_count
    }

    pub fn total_probes(&self) -> u64 {
        self.total_addresses * self.port_count
    }

    /// Completed units over total units for the configured mode
    pub fn completed_and_total(&self) -> (u64, u64) {
        match self.mode {
            ProgressMode::Probes => (self.probes_completed(), self.total_probes()),
            ProgressMode::Addresses => (self.addresses_processed, self.total_addresses),
        }
    }

    /// Get completion percentage. An empty workload counts as done.
    pub fn percentage(&self) -> f64 {
        let (completed, total) = self.completed_and_total();
        if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Get current scan rate in probes per second
    pub fn current_rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.probes_completed() as f64 / elapsed
        } else {
            0.0
        }
    }
}
