//! fleetcast-ledger — time-weighted cost accounting for fleetcast.
//!
//! Records one `CostSegment` per span of constant fleet size and answers
//! windowed cost queries exactly, prorating partial overlap. The open
//! segment has an implicit lifetime tied to "now": queries compute its
//! contribution up to the window end without closing it, so no background
//! timer is needed.
//!
//! # Invariants
//!
//! - Segments are contiguous and non-overlapping; exactly one is open.
//! - `total_cost` is additive across any window split.
//! - Ordering violations are surfaced as errors, never clamped.

pub mod error;
pub mod ledger;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{CostLedger, CostSummary};
