//! Domain types for fleetcast.
//!
//! These types represent the scaling policy, per-fleet mutable state,
//! telemetry input, decision output, and cost accounting segments. All
//! types are serializable to/from JSON for storage in redb tables and
//! for the presentation layer.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Unique identifier for a fleet. Multiple fleets are multiple
/// independent engine instances keyed by this id in the snapshot store.
pub type FleetId = String;

// ── Policy ────────────────────────────────────────────────────────

/// Scaling policy for one fleet. Immutable for the lifetime of an
/// engine; validated before an engine is constructed.
///
/// Thresholds and utilizations are fractions (0.8, not 80%).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalingPolicy {
    /// Lower bound on the fleet size (≥ 1).
    pub min_servers: u32,
    /// Upper bound on the fleet size.
    pub max_servers: u32,
    /// Requests per minute a single server unit can serve.
    pub capacity_per_server: f64,
    /// Predicted utilization at or above this fraction counts toward
    /// scale-out confirmation.
    pub scale_out_threshold: f64,
    /// Predicted utilization at or below this fraction counts toward
    /// scale-in confirmation.
    pub scale_in_threshold: f64,
    /// Utilization the fleet is sized for when an action fires.
    pub target_utilization: f64,
    /// Seconds after an executed action during which further actions
    /// are suppressed.
    pub cooldown_secs: u64,
    /// Consecutive qualifying periods required before scale-out fires.
    pub scale_out_confirm_periods: u32,
    /// Consecutive qualifying periods required before scale-in fires.
    pub scale_in_confirm_periods: u32,
    /// Cost of one server unit for one hour.
    pub cost_per_server_hour: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            min_servers: 1,
            max_servers: 50,
            capacity_per_server: 200.0,
            scale_out_threshold: 0.8,
            scale_in_threshold: 0.4,
            target_utilization: 0.7,
            cooldown_secs: 120,
            scale_out_confirm_periods: 2,
            scale_in_confirm_periods: 5,
            cost_per_server_hour: 0.10,
        }
    }
}

impl ScalingPolicy {
    /// Validate field ranges and threshold ordering.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.min_servers == 0 {
            return Err(PolicyError::ZeroMinServers);
        }
        if self.min_servers > self.max_servers {
            return Err(PolicyError::ServerBounds {
                min: self.min_servers,
                max: self.max_servers,
            });
        }
        if !(self.capacity_per_server > 0.0) || !self.capacity_per_server.is_finite() {
            return Err(PolicyError::NonPositiveCapacity(self.capacity_per_server));
        }
        for (name, value) in [
            ("scale_out_threshold", self.scale_out_threshold),
            ("scale_in_threshold", self.scale_in_threshold),
            ("target_utilization", self.target_utilization),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(PolicyError::ThresholdRange { name, value });
            }
        }
        if !(self.scale_in_threshold < self.target_utilization
            && self.target_utilization < self.scale_out_threshold)
        {
            return Err(PolicyError::ThresholdOrder {
                scale_in: self.scale_in_threshold,
                target: self.target_utilization,
                scale_out: self.scale_out_threshold,
            });
        }
        if self.scale_out_confirm_periods == 0 {
            return Err(PolicyError::ZeroConfirmPeriods("scale_out_confirm_periods"));
        }
        if self.scale_in_confirm_periods == 0 {
            return Err(PolicyError::ZeroConfirmPeriods("scale_in_confirm_periods"));
        }
        if self.cost_per_server_hour < 0.0 || !self.cost_per_server_hour.is_finite() {
            return Err(PolicyError::NegativeCost(self.cost_per_server_hour));
        }
        Ok(())
    }

    /// Requests per minute the given number of servers can absorb.
    pub fn capacity_of(&self, servers: u32) -> f64 {
        servers as f64 * self.capacity_per_server
    }

    /// Smallest server count that keeps `load` at or below the target
    /// utilization. Always at least 1; not clamped to the policy bounds.
    pub fn servers_for_load(&self, load: f64) -> u32 {
        let raw = load / (self.capacity_per_server * self.target_utilization);
        (raw.ceil() as u32).max(1)
    }
}

// ── Fleet state ───────────────────────────────────────────────────

/// Mutable per-fleet state, owned exclusively by one decision engine.
///
/// At most one of the two consecutive counters is non-zero at any time:
/// a period is classified into at most one directional bucket, and an
/// opposing or neutral observation (or an executed action) resets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetState {
    /// Current fleet size, always within the policy bounds.
    pub current_servers: u32,
    /// Unix timestamp of the last executed action. `None` means the
    /// fleet has never scaled and no cooldown is active.
    pub last_scaling_time: Option<u64>,
    /// Consecutive periods the scale-out condition held.
    pub consecutive_scale_out_periods: u32,
    /// Consecutive periods the scale-in condition held.
    pub consecutive_scale_in_periods: u32,
}

impl FleetState {
    /// Initial state for a fresh fleet under the given policy.
    pub fn initial(policy: &ScalingPolicy) -> Self {
        Self {
            current_servers: policy.min_servers,
            last_scaling_time: None,
            consecutive_scale_out_periods: 0,
            consecutive_scale_in_periods: 0,
        }
    }
}

// ── Telemetry ─────────────────────────────────────────────────────

/// A single traffic observation, produced externally (live measurement
/// or accelerated replay) and consumed once per decision cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    /// Unix timestamp (seconds) of the observation.
    pub timestamp: u64,
    /// Observed request volume, requests per minute.
    pub observed_requests: f64,
}

// ── Decision ──────────────────────────────────────────────────────

/// The direction of a scaling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingAction {
    ScaleOut,
    ScaleIn,
    Maintain,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingAction::ScaleOut => "scale-out",
            ScalingAction::ScaleIn => "scale-in",
            ScalingAction::Maintain => "maintain",
        }
    }
}

impl std::fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one evaluation cycle. Constructed fresh every cycle and
/// never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingDecision {
    /// Timestamp the decision was made for (the injected `now`).
    pub timestamp: u64,
    /// Fleet size before the decision.
    pub previous_servers: u32,
    /// Fleet size the engine recommends.
    pub recommended_servers: u32,
    pub action: ScalingAction,
    /// Human-readable justification.
    pub reason: String,
    /// Predicted utilization at the recommended size (fraction).
    pub estimated_utilization: f64,
    /// Hourly cost change implied by the recommendation.
    pub estimated_cost_delta: f64,
}

// ── Cost accounting ───────────────────────────────────────────────

/// One span of constant fleet size in the cost ledger. Append-only;
/// segments are contiguous and non-overlapping in time, with exactly
/// one open segment (`end_time == None`) at any instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostSegment {
    /// Unix timestamp when this fleet size took effect.
    pub start_time: u64,
    /// Unix timestamp when the size changed again; `None` while open.
    pub end_time: Option<u64>,
    /// Fleet size during this segment.
    pub server_count: u32,
    /// Cost of one server for one hour during this segment.
    pub rate: f64,
}

impl CostSegment {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

// ── Persistence ───────────────────────────────────────────────────

/// Persisted engine state. Reloading a snapshot restores cooldown and
/// confirmation counting exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub fleet: FleetState,
    /// Timestamp of the last accepted evaluation, used to reject
    /// non-monotonic ticks after a restart.
    pub last_tick: Option<u64>,
}
