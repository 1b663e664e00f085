//! Error types for the cost ledger.

use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
///
/// Ordering violations indicate a clock or caller bug and are surfaced,
/// never silently clamped.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("fleet change at {timestamp} precedes open segment start {open_start}")]
    OutOfOrder { timestamp: u64, open_start: u64 },

    #[error("cost window invalid: start {start} exceeds end {end}")]
    InvalidWindow { start: u64, end: u64 },

    #[error("segment history corrupt: {0}")]
    Corrupt(String),
}
