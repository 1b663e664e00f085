//! redb table definitions for the fleetcast snapshot store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Segment keys embed a zero-padded start timestamp so a prefix
//! scan yields segments in chronological order.

use redb::TableDefinition;

/// Engine snapshots keyed by `{fleet_id}`.
pub const ENGINES: TableDefinition<&str, &[u8]> = TableDefinition::new("engines");

/// Cost segments keyed by `{fleet_id}:{start_time:020}`.
pub const SEGMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("segments");

/// Build the segments-table key for a fleet and segment start time.
pub fn segment_key(fleet_id: &str, start_time: u64) -> String {
    format!("{fleet_id}:{start_time:020}")
}
