//! fleetcast-engine — the autoscaling decision engine.
//!
//! Converts telemetry ticks and short-horizon forecasts into
//! `ScalingDecision`s: how many server units should run, when to change
//! that number, and what the hourly cost implication is. Executed fleet
//! changes are recorded in the cost ledger.
//!
//! # Decision cycle
//!
//! ```text
//! evaluate(sample, forecast, now)
//!   ├── validate inputs (reject ⇒ state unchanged)
//!   ├── select driving horizon (unusable ⇒ degrade to observed load)
//!   ├── classify period → consecutive counters (hysteresis)
//!   ├── cooldown overlay (suppresses action, not observation)
//!   ├── fire on confirmation → ledger.record_fleet_change()
//!   └── ScalingDecision { action, reason, utilization, cost delta }
//! ```
//!
//! The engine owns no timers and never reads a wall clock: `now` is
//! supplied by the caller, so a decision sequence is a pure function of
//! its input sequence.

pub mod engine;
pub mod error;

pub use engine::DecisionEngine;
pub use error::EvaluateError;
