//! CostLedger — time-weighted fleet cost accounting.
//!
//! The ledger records one segment per span of constant fleet size and
//! answers windowed cost queries exactly, prorating partial overlap.
//! There is always exactly one open segment; querying never closes it,
//! the open segment simply contributes up to the window end.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetcast_state::CostSegment;

use crate::error::{LedgerError, LedgerResult};

const SECS_PER_HOUR: f64 = 3600.0;

/// Windowed cost report for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostSummary {
    /// Time-weighted cost over the window.
    pub total_cost: f64,
    /// Time-weighted mean fleet size over the window.
    pub average_servers: f64,
    /// Fleet size of the open segment.
    pub current_servers: u32,
    /// Cost per hour at the current fleet size.
    pub current_hourly_rate: f64,
    /// Closed segments intersecting the window (executed fleet changes).
    pub scaling_events: usize,
}

/// Thread-safe cost ledger handle.
///
/// Cloning shares the underlying ledger; the internal lock serializes
/// fleet changes against cost queries so a reader never observes a
/// half-closed segment.
#[derive(Clone)]
pub struct CostLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

struct LedgerInner {
    rate: f64,
    /// Closed segments, oldest first, contiguous.
    closed: Vec<CostSegment>,
    /// The currently accruing segment (`end_time` is always `None`).
    open: CostSegment,
}

impl CostLedger {
    /// Open a ledger with its first segment.
    pub fn new(rate: f64, start_time: u64, initial_servers: u32) -> Self {
        let inner = LedgerInner {
            rate,
            closed: Vec::new(),
            open: CostSegment {
                start_time,
                end_time: None,
                server_count: initial_servers,
                rate,
            },
        };
        debug!(start_time, initial_servers, rate, "cost ledger opened");
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Rebuild a ledger from persisted segments.
    ///
    /// Expects the segments of [`CostLedger::segments`]: chronological,
    /// every segment but the last closed, the last one open.
    pub fn restore(rate: f64, mut segments: Vec<CostSegment>) -> LedgerResult<Self> {
        segments.sort_by_key(|s| s.start_time);
        let Some(open) = segments.pop() else {
            return Err(LedgerError::Corrupt("no segments".to_string()));
        };
        if !open.is_open() {
            return Err(LedgerError::Corrupt(
                "last segment is not open".to_string(),
            ));
        }
        if let Some(bad) = segments.iter().find(|s| s.is_open()) {
            return Err(LedgerError::Corrupt(format!(
                "closed history contains an open segment starting at {}",
                bad.start_time
            )));
        }
        let inner = LedgerInner {
            rate,
            closed: segments,
            open,
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Record a fleet-size change at `timestamp`.
    ///
    /// Closes the open segment at `timestamp` and opens a new one with
    /// `new_count`. A timestamp older than the open segment's start is a
    /// caller bug and fails; a change to the same count is a no-op, since
    /// a segment closes exactly when the count changes.
    pub fn record_fleet_change(&self, timestamp: u64, new_count: u32) -> LedgerResult<()> {
        let mut inner = self.inner.write().expect("ledger lock poisoned");
        if timestamp < inner.open.start_time {
            return Err(LedgerError::OutOfOrder {
                timestamp,
                open_start: inner.open.start_time,
            });
        }
        if new_count == inner.open.server_count {
            debug!(timestamp, new_count, "fleet change with unchanged count ignored");
            return Ok(());
        }

        let rate = inner.rate;
        let mut finished = CostSegment {
            start_time: timestamp,
            end_time: None,
            server_count: new_count,
            rate,
        };
        std::mem::swap(&mut inner.open, &mut finished);
        finished.end_time = Some(timestamp);
        debug!(
            from = finished.server_count,
            to = new_count,
            at = timestamp,
            "cost segment closed, new segment opened"
        );
        inner.closed.push(finished);
        Ok(())
    }

    /// Time-weighted cost over `[window_start, window_end)`.
    ///
    /// Exact for partial-segment overlap; the open segment contributes up
    /// to `window_end` (callers pass their own "now" for an unbounded
    /// window — the ledger never reads a wall clock).
    pub fn total_cost(&self, window_start: u64, window_end: u64) -> LedgerResult<f64> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        inner.fold_overlaps(window_start, window_end, |acc, seg, overlap_secs| {
            acc + seg.server_count as f64 * seg.rate * overlap_secs / SECS_PER_HOUR
        })
    }

    /// Time-weighted mean fleet size over `[window_start, window_end)`.
    ///
    /// Computed independently of the rate; the denominator is the window
    /// time the ledger actually covers.
    pub fn average_server_count(&self, window_start: u64, window_end: u64) -> LedgerResult<f64> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        let server_secs = inner.fold_overlaps(window_start, window_end, |acc, seg, secs| {
            acc + seg.server_count as f64 * secs
        })?;
        let covered_secs =
            inner.fold_overlaps(window_start, window_end, |acc, _, secs| acc + secs)?;
        if covered_secs > 0.0 {
            Ok(server_secs / covered_secs)
        } else {
            Ok(0.0)
        }
    }

    /// Windowed cost report, computed as one consistent view.
    pub fn summary(&self, window_start: u64, window_end: u64) -> LedgerResult<CostSummary> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        let total_cost = inner.fold_overlaps(window_start, window_end, |acc, seg, secs| {
            acc + seg.server_count as f64 * seg.rate * secs / SECS_PER_HOUR
        })?;
        let server_secs = inner.fold_overlaps(window_start, window_end, |acc, seg, secs| {
            acc + seg.server_count as f64 * secs
        })?;
        let covered_secs =
            inner.fold_overlaps(window_start, window_end, |acc, _, secs| acc + secs)?;
        let scaling_events = inner
            .closed
            .iter()
            .filter(|seg| overlap_secs(seg, window_start, window_end) > 0.0)
            .count();
        Ok(CostSummary {
            total_cost,
            average_servers: if covered_secs > 0.0 {
                server_secs / covered_secs
            } else {
                0.0
            },
            current_servers: inner.open.server_count,
            current_hourly_rate: inner.open.server_count as f64 * inner.rate,
            scaling_events,
        })
    }

    /// Fleet size of the open segment.
    pub fn current_servers(&self) -> u32 {
        self.inner.read().expect("ledger lock poisoned").open.server_count
    }

    /// Cost per hour at the current fleet size.
    pub fn current_rate(&self) -> f64 {
        let inner = self.inner.read().expect("ledger lock poisoned");
        inner.open.server_count as f64 * inner.rate
    }

    /// All segments, oldest first, ending with the open one. Suitable for
    /// persistence and for [`CostLedger::restore`].
    pub fn segments(&self) -> Vec<CostSegment> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        let mut all = inner.closed.clone();
        all.push(inner.open.clone());
        all
    }

    /// Alias for [`CostLedger::segments`], for presentation callers.
    pub fn history(&self) -> Vec<CostSegment> {
        self.segments()
    }
}

impl LedgerInner {
    /// Fold `f` over every segment's overlap with the window.
    fn fold_overlaps<F>(&self, window_start: u64, window_end: u64, f: F) -> LedgerResult<f64>
    where
        F: Fn(f64, &CostSegment, f64) -> f64,
    {
        if window_start > window_end {
            return Err(LedgerError::InvalidWindow {
                start: window_start,
                end: window_end,
            });
        }
        let mut acc = 0.0;
        for seg in self.closed.iter().chain(std::iter::once(&self.open)) {
            let secs = overlap_secs(seg, window_start, window_end);
            if secs > 0.0 {
                acc = f(acc, seg, secs);
            }
        }
        Ok(acc)
    }
}

/// Seconds of overlap between a segment and `[window_start, window_end)`.
/// An open segment extends to the window end.
fn overlap_secs(seg: &CostSegment, window_start: u64, window_end: u64) -> f64 {
    let seg_end = seg.end_time.unwrap_or(window_end);
    let start = seg.start_time.max(window_start);
    let end = seg_end.min(window_end);
    end.saturating_sub(start) as f64
}
