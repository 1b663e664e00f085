//! Error types for the fleetcast snapshot store and policy validation.

use thiserror::Error;

/// Result type alias for snapshot store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during snapshot store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors from validating a scaling policy.
///
/// Any of these is fatal at construction time: no engine is created from
/// an invalid policy.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("min_servers must be at least 1")]
    ZeroMinServers,

    #[error("server bounds invalid: min {min} exceeds max {max}")]
    ServerBounds { min: u32, max: u32 },

    #[error("capacity_per_server must be positive, got {0}")]
    NonPositiveCapacity(f64),

    #[error("{name} must be a fraction in (0, 1), got {value}")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error(
        "threshold ordering invalid: require scale_in ({scale_in}) < target ({target}) < scale_out ({scale_out})"
    )]
    ThresholdOrder {
        scale_in: f64,
        target: f64,
        scale_out: f64,
    },

    #[error("{0} must be at least 1 period")]
    ZeroConfirmPeriods(&'static str),

    #[error("cost_per_server_hour must be non-negative, got {0}")]
    NegativeCost(f64),

    #[error("snapshot server count {count} outside policy bounds [{min}, {max}]")]
    SnapshotBounds { count: u32, min: u32, max: u32 },
}
