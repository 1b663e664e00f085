//! fleetcast-state — domain types and embedded persistence for fleetcast.
//!
//! Holds the scaling policy (validated at load), the per-fleet mutable
//! state, telemetry and decision value types, cost segments, and a small
//! [redb](https://docs.rs/redb)-backed snapshot store so an engine can
//! resume cooldown and confirmation counting exactly after a restart.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Engine snapshots are keyed by fleet id; cost segments use composite
//! `{fleet_id}:{start_time}` keys with a zero-padded timestamp so prefix
//! scans come back in chronological order.
//!
//! The `SnapshotStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod config;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use config::{FleetConfig, parse_duration};
pub use error::{PolicyError, StateError, StateResult};
pub use store::SnapshotStore;
pub use types::*;
