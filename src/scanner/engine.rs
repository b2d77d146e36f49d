//! Chunk scheduling engine
//!
//! Stateless: every call gets the whole session (definition plus cursor) and
//! returns the next slice of results. Re-running with the same cursor probes
//! the same pairs again.

use crate::config::ScanConfig;
use crate::network::{server_name, NameCache, ProbeStatus, TargetProber};
use crate::scanner::{ChunkResponse, ProbeResult, ScanSession};
use futures::stream::{self, StreamExt};
use std::net::Ipv4Addr;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Main scanning engine
#[derive(Clone)]
pub struct ScanEngine {
    config: ScanConfig,
    prober: TargetProber,
}

impl ScanEngine {
    /// Create an engine probing with TCP connect and the system resolver
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        let prober = TargetProber::from_config(&config);
        Self::with_prober(config, prober)
    }

    /// Create an engine with a custom prober
    pub fn with_prober(config: ScanConfig, prober: TargetProber) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self { config, prober })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Validate a scan definition against this engine's policies
    pub fn open_session(&self, start: &str, end: &str, ports: &str) -> crate::Result<ScanSession> {
        ScanSession::parse(start, end, ports, &self.config)
    }

    /// Addresses the next chunk will cover: up to `chunk_size` starting at
    /// the cursor, fewer at the end of the range.
    pub fn select_chunk(&self, session: &ScanSession) -> Vec<Ipv4Addr> {
        session
            .range()
            .slice(session.cursor(), self.config.chunk_size as u64)
    }

    /// Probe the next chunk of `session`.
    ///
    /// Results come back address-major, port-minor, whatever order the
    /// probes actually finish in. Only returns once every probe of the
    /// chunk is done.
    pub async fn next_chunk(&self, session: &ScanSession) -> ChunkResponse {
        let total = session.total_address_count();
        let cursor = session.cursor();

        if total == 0 || session.ports().is_empty() {
            log::debug!("Nothing to probe ({} addresses, {} ports)", total, session.ports().len());
            return ChunkResponse::finished(cursor, total);
        }

        let addresses = self.select_chunk(session);
        let pairs: Vec<(Ipv4Addr, u16)> = addresses
            .iter()
            .flat_map(|&addr| session.ports().ports().iter().map(move |&port| (addr, port)))
            .collect();

        let started = Instant::now();
        let concurrency = self.config.max_concurrency;
        let prober = &self.prober;

        // Lookups and connects draw from one budget of `max_concurrency` slots
        let permits = Semaphore::new(concurrency);
        let permits = &permits;

        // Names once per address, connects once per pair, both at the same time
        let mut names = NameCache::new();
        let (_, reachable) = tokio::join!(
            names.fill(prober.resolver(), &addresses, prober.resolve_timeout(), permits),
            stream::iter(pairs.iter().copied())
                .map(move |(addr, port)| async move {
                    let _permit = permits.acquire().await.ok();
                    prober.reachable(addr, port).await
                })
                .buffered(concurrency)
                .collect::<Vec<bool>>(),
        );

        let results: Vec<ProbeResult> = pairs
            .into_iter()
            .zip(reachable)
            .map(|((addr, port), open)| {
                ProbeResult::new(addr, port, ProbeStatus::from_reachable(open), server_name(names.get(&addr)))
            })
            .collect();

        let new_cursor = cursor + addresses.len() as u64;
        let complete = new_cursor >= total;

        log::debug!(
            "Chunk {}..{} of {}: {} probes, {} open in {:?}",
            cursor,
            new_cursor,
            total,
            results.len(),
            results.iter().filter(|r| r.is_reachable()).count(),
            started.elapsed()
        );

        ChunkResponse {
            cursor,
            results,
            new_cursor,
            complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConnectOutcome, NameResolver, PortScanner};
    use crate::network::{NoopResolver, UNRESOLVED_NAME};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Open when the port is in the set; later addresses answer faster so
    /// completion order differs from request order
    struct ScriptedScanner {
        open: HashSet<(Ipv4Addr, u16)>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl PortScanner for ScriptedScanner {
        async fn connect(&self, target: Ipv4Addr, port: u16, _timeout: Duration) -> ConnectOutcome {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let delay = 20u64.saturating_sub(target.octets()[3] as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.open.contains(&(target, port)) {
                ConnectOutcome::Connected
            } else {
                ConnectOutcome::Refused
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct RecordingResolver {
        lookups: Mutex<Vec<Ipv4Addr>>,
    }

    #[async_trait]
    impl NameResolver for RecordingResolver {
        async fn reverse_lookup(&self, target: Ipv4Addr, _timeout: Duration) -> Option<String> {
            self.lookups.lock().unwrap().push(target);
            if target.octets()[3] == 1 {
                Some("gateway.lan".to_string())
            } else {
                None
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn engine(open: &[(Ipv4Addr, u16)]) -> (ScanEngine, Arc<ScriptedScanner>, Arc<RecordingResolver>) {
        let scanner = Arc::new(ScriptedScanner {
            open: open.iter().copied().collect(),
            connects: AtomicUsize::new(0),
        });
        let resolver = Arc::new(RecordingResolver { lookups: Mutex::new(Vec::new()) });
        let prober = TargetProber::new(
            scanner.clone(),
            resolver.clone(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        let engine = ScanEngine::with_prober(ScanConfig::default(), prober).unwrap();
        (engine, scanner, resolver)
    }

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[tokio::test]
    async fn test_two_chunk_walkthrough() {
        let (engine, _, _) = engine(&[(ip(1), 22), (ip(4), 80)]);
        let session = engine.open_session("10.0.0.1", "10.0.0.4", "22,80").unwrap();

        let first = engine.next_chunk(&session).await;
        assert_eq!(first.results.len(), 6);
        assert_eq!(first.new_cursor, 3);
        assert!(!first.complete);

        let session = session.with_cursor(first.new_cursor);
        let second = engine.next_chunk(&session).await;
        assert_eq!(second.results.len(), 2);
        assert_eq!(second.new_cursor, 4);
        assert!(second.complete);
        assert!(second.results[1].is_reachable());
    }

    #[tokio::test]
    async fn test_results_are_address_major_port_minor() {
        let (engine, _, _) = engine(&[]);
        let session = engine.open_session("10.0.0.1", "10.0.0.3", "443,22").unwrap();
        let response = engine.next_chunk(&session).await;

        let order: Vec<(Ipv4Addr, u16)> = response.results.iter().map(|r| (r.address, r.port)).collect();
        assert_eq!(
            order,
            vec![(ip(1), 443), (ip(1), 22), (ip(2), 443), (ip(2), 22), (ip(3), 443), (ip(3), 22)]
        );
    }

    #[tokio::test]
    async fn test_one_lookup_per_address() {
        let (engine, scanner, resolver) = engine(&[]);
        let session = engine.open_session("10.0.0.1", "10.0.0.3", "21,22,80,443").unwrap();
        let response = engine.next_chunk(&session).await;

        assert_eq!(scanner.connects.load(Ordering::SeqCst), 12);
        assert_eq!(resolver.lookups.lock().unwrap().len(), 3);
        assert!(response.results[..4].iter().all(|r| r.server_name == "gateway.lan"));
        assert!(response.results[4..].iter().all(|r| r.server_name == UNRESOLVED_NAME));
    }

    #[tokio::test]
    async fn test_empty_inputs_finish_without_probing() {
        let (engine, scanner, _) = engine(&[]);

        let reversed = engine.open_session("10.0.0.9", "10.0.0.1", "80").unwrap();
        let response = engine.next_chunk(&reversed).await;
        assert!(response.complete);
        assert!(response.results.is_empty());
        assert_eq!(response.new_cursor, 0);

        let no_ports = engine.open_session("10.0.0.1", "10.0.0.9", " , abc").unwrap();
        let response = engine.next_chunk(&no_ports).await;
        assert!(response.complete);
        assert!(response.results.is_empty());

        assert_eq!(scanner.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_cursor_is_idempotent() {
        let (engine, _, _) = engine(&[(ip(2), 80)]);
        let session = engine.open_session("10.0.0.1", "10.0.0.5", "80,81").unwrap().with_cursor(0);

        let first = engine.next_chunk(&session).await;
        let retry = engine.next_chunk(&session).await;
        assert_eq!(first, retry);
    }

    #[tokio::test]
    async fn test_cursor_past_end() {
        let (engine, _, _) = engine(&[]);
        let session = engine.open_session("10.0.0.1", "10.0.0.2", "80").unwrap().with_cursor(10);
        let response = engine.next_chunk(&session).await;
        assert!(response.results.is_empty());
        assert!(response.complete);
        assert_eq!(response.new_cursor, 10);
    }

    #[tokio::test]
    async fn test_chunks_cover_range_exactly_once() {
        let (engine, _, _) = engine(&[]);
        let mut session = engine.open_session("10.0.0.1", "10.0.0.10", "80").unwrap();
        let mut seen = Vec::new();

        loop {
            let response = engine.next_chunk(&session).await;
            seen.extend(response.results.iter().map(|r| r.address));
            session = session.with_cursor(response.new_cursor);
            if response.complete {
                break;
            }
        }

        let expected: Vec<Ipv4Addr> = session.range().iter().collect();
        assert_eq!(seen, expected);
    }

    /// Tracks how much work is in flight at once, across scanner and resolver
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        async fn hold(&self, delay: Duration) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct GaugedScanner(Arc<Gauge>);

    #[async_trait]
    impl PortScanner for GaugedScanner {
        async fn connect(&self, _target: Ipv4Addr, _port: u16, _timeout: Duration) -> ConnectOutcome {
            self.0.hold(Duration::from_millis(5)).await;
            ConnectOutcome::Refused
        }

        fn name(&self) -> &str {
            "gauged"
        }
    }

    struct GaugedResolver(Arc<Gauge>);

    #[async_trait]
    impl NameResolver for GaugedResolver {
        async fn reverse_lookup(&self, _target: Ipv4Addr, _timeout: Duration) -> Option<String> {
            self.0.hold(Duration::from_millis(15)).await;
            None
        }

        fn name(&self) -> &str {
            "gauged"
        }
    }

    #[tokio::test]
    async fn test_lookups_and_connects_share_concurrency_budget() {
        let gauge = Arc::new(Gauge::default());
        let prober = TargetProber::new(
            Arc::new(GaugedScanner(gauge.clone())),
            Arc::new(GaugedResolver(gauge.clone())),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        let config = ScanConfig::default().with_chunk_size(8).with_concurrency(4);
        let engine = ScanEngine::with_prober(config, prober).unwrap();

        let session = engine.open_session("10.0.0.1", "10.0.0.8", "21,22,80").unwrap();
        let response = engine.next_chunk(&session).await;

        assert_eq!(response.results.len(), 24);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak in-flight work {}", peak);
        assert!(peak > 1);
    }

    /// Closed everywhere, answers immediately; needs no timer
    struct AllClosed;

    #[async_trait]
    impl PortScanner for AllClosed {
        async fn connect(&self, _target: Ipv4Addr, _port: u16, _timeout: Duration) -> ConnectOutcome {
            ConnectOutcome::Refused
        }

        fn name(&self) -> &str {
            "closed"
        }
    }

    /// (chunk size, range length) with the length often an exact multiple of the chunk
    fn chunk_and_length() -> impl Strategy<Value = (usize, u32)> {
        (1usize..=8, 0u32..=5, 0u32..8).prop_map(|(chunk, whole, extra)| {
            (chunk, chunk as u32 * whole + extra % chunk as u32)
        })
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_range_exactly_once((chunk, len) in chunk_and_length(), port_count in 0usize..=3) {
            let prober = TargetProber::new(
                Arc::new(AllClosed),
                Arc::new(NoopResolver),
                Duration::from_millis(10),
                Duration::from_millis(10),
            );
            let engine = ScanEngine::with_prober(ScanConfig::default().with_chunk_size(chunk), prober).unwrap();

            let first = 0x0A00_0100u32;
            let last = Ipv4Addr::from(first.wrapping_add(len).wrapping_sub(1));
            let ports = ["22", "80", "443"][..port_count].join(",");
            let mut session = engine
                .open_session(&Ipv4Addr::from(first).to_string(), &last.to_string(), &ports)
                .unwrap();
            let total = session.total_address_count();
            prop_assert_eq!(total, len as u64);

            let mut seen = Vec::new();
            let mut calls = 0u64;
            let final_cursor = loop {
                let response = tokio_test::block_on(engine.next_chunk(&session));
                calls += 1;
                prop_assert!(response.new_cursor >= session.cursor());
                seen.extend(response.results.iter().map(|r| (r.address, r.port)));
                session = session.with_cursor(response.new_cursor);
                if response.complete {
                    break response.new_cursor;
                }
            };

            let expected: Vec<(Ipv4Addr, u16)> = session
                .range()
                .iter()
                .flat_map(|addr| session.ports().ports().iter().map(move |&port| (addr, port)))
                .collect();
            prop_assert_eq!(seen, expected);
            prop_assert_eq!(final_cursor, total);

            let expected_calls = if port_count == 0 || len == 0 {
                1
            } else {
                (total + chunk as u64 - 1) / chunk as u64
            };
            prop_assert_eq!(calls, expected_calls);
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ScanConfig::default().with_concurrency(0);
        assert!(ScanEngine::new(config).is_err());
    }
}
