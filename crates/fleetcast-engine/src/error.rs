//! Error types for the decision engine.

use thiserror::Error;

use fleetcast_ledger::LedgerError;

/// Errors that can fail a single `evaluate` call.
///
/// Every variant leaves engine state unchanged; the caller may retry
/// with corrected input. Forecast unavailability is not here — it is
/// absorbed into a degraded decision, never surfaced as a failure.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("invalid telemetry sample: {0}")]
    InvalidSample(String),

    #[error("invalid forecast: {0}")]
    InvalidForecast(String),

    #[error("non-monotonic tick: now {now} precedes last accepted tick {last}")]
    NonMonotonicTick { now: u64, last: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
