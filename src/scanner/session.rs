//! Caller-side session driver
//!
//! Owns the session, the cursor and the accumulated results, and keeps
//! calling the engine until the range is exhausted or the scan is cancelled.

use crate::config::{ProgressMode, ScanConfig};
use crate::error::ScanError;
use crate::scanner::{AccumulatedResults, ChunkResponse, ScanEngine, ScanProgress, ScanSession};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How a driven scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Completed,
    Cancelled,
}

/// Accumulates chunk results for one session
#[derive(Debug, Clone)]
pub struct ScanAggregator {
    session: ScanSession,
    results: AccumulatedResults,
    progress_mode: ProgressMode,
    poll_delay: Duration,
    start_time: Instant,
}

impl ScanAggregator {
    pub fn new(session: ScanSession, config: &ScanConfig) -> Self {
        Self {
            session,
            results: AccumulatedResults::new(),
            progress_mode: config.progress_mode,
            poll_delay: config.poll_delay(),
            start_time: Instant::now(),
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn results(&self) -> &AccumulatedResults {
        &self.results
    }

    pub fn into_results(self) -> AccumulatedResults {
        self.results
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            open_found: self.results.open_count(),
            ..ScanProgress::new(&self.session, self.progress_mode, self.start_time)
        }
    }

    /// Fold one chunk into the session.
    ///
    /// The chunk must start where the session's cursor is; anything else
    /// would skip or repeat addresses.
    pub fn merge(&mut self, response: &ChunkResponse) -> crate::Result<()> {
        if response.cursor != self.session.cursor() {
            return Err(ScanError::CursorMismatch {
                expected: self.session.cursor(),
                actual: response.cursor,
            });
        }

        self.results.append(&response.results);
        self.session.advance_to(response.new_cursor);
        Ok(())
    }

    /// Drop the accumulated results and start over from the first address
    pub fn reset(&mut self) {
        self.results.clear();
        self.session.rewind();
        self.start_time = Instant::now();
    }

    /// Run one chunk and merge it
    pub async fn step(&mut self, engine: &ScanEngine) -> crate::Result<ChunkResponse> {
        let response = engine.next_chunk(&self.session).await;
        self.merge(&response)?;
        Ok(response)
    }

    /// Drive chunks until done or `cancel` fires.
    ///
    /// `on_chunk` sees each merged chunk together with the updated progress.
    /// A chunk interrupted by cancellation is dropped whole, so the results
    /// never hold part of a chunk.
    pub async fn run<F>(
        &mut self,
        engine: &ScanEngine,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> crate::Result<ScanStatus>
    where
        F: FnMut(&ChunkResponse, &ScanProgress),
    {
        log::info!(
            "Scanning {} addresses x {} ports ({} probes)",
            self.session.total_address_count(),
            self.session.ports().len(),
            self.session.total_probe_count()
        );

        loop {
            if self.is_complete() {
                log::info!("Scan complete: {} results, {} open", self.results.len(), self.results.open_count());
                return Ok(ScanStatus::Completed);
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                response = engine.next_chunk(&self.session) => response,
            };

            self.merge(&response)?;
            on_chunk(&response, &self.progress());

            if !self.is_complete() && !self.poll_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_delay) => {}
                }
            }
        }

        log::info!("Scan cancelled at address {} of {}", self.session.cursor(), self.session.total_address_count());
        Ok(ScanStatus::Cancelled)
    }
}
