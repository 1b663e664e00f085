//! SnapshotStore — redb-backed persistence for fleetcast.
//!
//! Persists the small fixed-field records that let an engine resume after
//! a restart: the `EngineSnapshot` (fleet state plus last tick) and the
//! cost ledger's segments. Values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{segment_key, ENGINES, SEGMENTS};
use crate::types::{CostSegment, EngineSnapshot};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe snapshot store backed by redb.
#[derive(Clone)]
pub struct SnapshotStore {
    db: Arc<Database>,
}

impl SnapshotStore {
    /// Open (or create) a persistent snapshot store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "snapshot store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory snapshot store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory snapshot store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ENGINES).map_err(map_err!(Table))?;
        txn.open_table(SEGMENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Engine snapshots ───────────────────────────────────────────

    /// Insert or update the engine snapshot for a fleet.
    pub fn put_engine_snapshot(
        &self,
        fleet_id: &str,
        snapshot: &EngineSnapshot,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(snapshot).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENGINES).map_err(map_err!(Table))?;
            table
                .insert(fleet_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%fleet_id, "engine snapshot stored");
        Ok(())
    }

    /// Get the engine snapshot for a fleet, if one was persisted.
    pub fn get_engine_snapshot(&self, fleet_id: &str) -> StateResult<Option<EngineSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENGINES).map_err(map_err!(Table))?;
        match table.get(fleet_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let snapshot: EngineSnapshot =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    // ── Cost segments ──────────────────────────────────────────────

    /// Insert or update a cost segment for a fleet.
    ///
    /// Segments are keyed by start time, so closing the open segment
    /// (setting `end_time`) overwrites the record in place.
    pub fn put_segment(&self, fleet_id: &str, segment: &CostSegment) -> StateResult<()> {
        let key = segment_key(fleet_id, segment.start_time);
        let value = serde_json::to_vec(segment).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SEGMENTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%fleet_id, start = segment.start_time, servers = segment.server_count, "cost segment stored");
        Ok(())
    }

    /// Write every segment of a ledger in one transaction.
    pub fn put_segments(&self, fleet_id: &str, segments: &[CostSegment]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SEGMENTS).map_err(map_err!(Table))?;
            for segment in segments {
                let key = segment_key(fleet_id, segment.start_time);
                let value = serde_json::to_vec(segment).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%fleet_id, count = segments.len(), "cost segments stored");
        Ok(())
    }

    /// List all cost segments for a fleet in chronological order.
    pub fn list_segments(&self, fleet_id: &str) -> StateResult<Vec<CostSegment>> {
        let prefix = format!("{fleet_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SEGMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let segment: CostSegment =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(segment);
        }
        // Zero-padded keys already sort chronologically, but the table
        // interleaves fleets; sort the filtered set to be safe.
        results.sort_by_key(|s| s.start_time);
        Ok(results)
    }

    /// Delete the snapshot and all segments for a fleet. Returns true
    /// if an engine snapshot existed.
    pub fn delete_fleet(&self, fleet_id: &str) -> StateResult<bool> {
        let prefix = format!("{fleet_id}:");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut engines = txn.open_table(ENGINES).map_err(map_err!(Table))?;
            existed = engines.remove(fleet_id).map_err(map_err!(Write))?.is_some();

            let mut segments = txn.open_table(SEGMENTS).map_err(map_err!(Table))?;
            let keys: Vec<String> = segments
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| entry.ok())
                .map(|(key, _)| key.value().to_string())
                .filter(|key| key.starts_with(&prefix))
                .collect();
            for key in keys {
                segments.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%fleet_id, existed, "fleet deleted from snapshot store");
        Ok(existed)
    }

    /// List all fleet ids with a persisted engine snapshot.
    pub fn list_fleets(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENGINES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            results.push(key.value().to_string());
        }
        Ok(results)
    }
}
