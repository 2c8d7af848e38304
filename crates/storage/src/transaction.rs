//! Write transactions
//!
//! A [`Transaction`] buffers its writes in a private write set and reads
//! through it, so every read inside the transaction observes the
//! transaction's own earlier writes:
//!
//! 1. **write set** hit with `Some(row)` returns the pending row
//! 2. **write set** hit with `None` reports the row as absent
//! 3. otherwise the committed row is returned
//!
//! Nothing becomes visible to other readers until [`Transaction::commit`];
//! dropping an uncommitted transaction discards the write set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLockUpgradableReadGuard;
use tracing::debug;
use trellis_core::{EntityId, TenantId, TrellisResult, Value, VersionId};

use crate::row::{RowKey, StoredRow, VersionRecord};
use crate::source::{tenant_records, RowSource};
use crate::store::{BatchStats, CommitInfo, RowStore, StoreState};

/// An open write transaction
///
/// Holds the store's upgradable read guard for its whole lifetime.
pub struct Transaction<'a> {
    store: &'a RowStore,
    state: RwLockUpgradableReadGuard<'a, StoreState>,
    writes: BTreeMap<RowKey, Option<StoredRow>>,
    version_writes: BTreeMap<VersionId, Option<VersionRecord>>,
    now: DateTime<Utc>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a RowStore, state: RwLockUpgradableReadGuard<'a, StoreState>) -> Self {
        Self {
            store,
            state,
            writes: BTreeMap::new(),
            version_writes: BTreeMap::new(),
            now: Utc::now(),
        }
    }

    /// Timestamp applied to every row written by this transaction
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Write `fields` under `key`
    ///
    /// Keeps the `created_at` of a row already stored under the same key.
    pub fn put(&mut self, key: RowKey, fields: BTreeMap<String, Value>) {
        let mut row = StoredRow::new(fields, self.now);
        if let Some(existing) = self.row(&key).filter(|r| !r.tombstone) {
            row.created_at = existing.created_at;
        }
        self.writes.insert(key, Some(row));
    }

    /// Write a row as-is (used for plane copies)
    pub fn put_row(&mut self, key: RowKey, row: StoredRow) {
        self.writes.insert(key, Some(row));
    }

    /// Mark `key` deleted within its version plane
    pub fn put_tombstone(&mut self, key: RowKey) {
        let row = StoredRow::tombstone(self.now);
        self.writes.insert(key, Some(row));
    }

    /// Physically remove the row stored under `key`
    pub fn remove(&mut self, key: RowKey) {
        self.writes.insert(key, None);
    }

    /// Record a version plane
    pub fn put_version_record(&mut self, record: VersionRecord) {
        self.version_writes.insert(record.version_id, Some(record));
    }

    /// Drop the record of a version plane
    pub fn remove_version_record(&mut self, version: VersionId) {
        self.version_writes.insert(version, None);
    }

    /// Number of buffered row and record writes
    pub fn pending(&self) -> usize {
        self.writes.len() + self.version_writes.len()
    }

    /// Publish the write set
    ///
    /// Upgrades the guard to a write lock and applies every buffered write
    /// in one batch. An empty write set commits without taking the write
    /// lock or consuming a sequence number.
    pub fn commit(self) -> TrellisResult<CommitInfo> {
        let Transaction {
            store,
            state,
            writes,
            version_writes,
            ..
        } = self;

        if writes.is_empty() && version_writes.is_empty() {
            return Ok(CommitInfo {
                commit_seq: store.current_commit_seq(),
                stats: BatchStats::default(),
            });
        }

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let commit_seq = store.next_commit_seq();
        let stats = state.apply_batch(writes, version_writes, commit_seq);

        debug!(
            target: "trellis::storage",
            commit_seq,
            rows_written = stats.rows_written,
            rows_removed = stats.rows_removed,
            "committed batch"
        );

        Ok(CommitInfo { commit_seq, stats })
    }
}

impl RowSource for Transaction<'_> {
    fn row(&self, key: &RowKey) -> Option<&StoredRow> {
        match self.writes.get(key) {
            Some(pending) => pending.as_ref(),
            None => self.state.rows.get(key),
        }
    }

    fn plane_rows(
        &self,
        tenant: TenantId,
        entity: &str,
        version: VersionId,
    ) -> Vec<(EntityId, &StoredRow)> {
        let mut merged: BTreeMap<EntityId, &StoredRow> = self
            .state
            .plane_rows(tenant, entity, version)
            .into_iter()
            .collect();

        let pending = self
            .writes
            .range(RowKey::range_start(tenant, entity, version)..)
            .take_while(|(k, _)| k.in_range(tenant, entity, version));
        for (key, write) in pending {
            match write {
                Some(row) => {
                    merged.insert(key.id, row);
                }
                None => {
                    merged.remove(&key.id);
                }
            }
        }

        merged.into_iter().collect()
    }

    fn plane_keys(&self, version: VersionId) -> Vec<RowKey> {
        if version.is_live() {
            return Vec::new();
        }
        let mut keys: std::collections::BTreeSet<RowKey> = self
            .state
            .plane_index
            .get(&version)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for (key, write) in self.writes.iter().filter(|(k, _)| k.version == version) {
            match write {
                Some(_) => {
                    keys.insert(key.clone());
                }
                None => {
                    keys.remove(key);
                }
            }
        }
        keys.into_iter().collect()
    }

    fn version_record(&self, version: &VersionId) -> Option<&VersionRecord> {
        match self.version_writes.get(version) {
            Some(pending) => pending.as_ref(),
            None => self.state.versions.get(version),
        }
    }

    fn version_records(&self, tenant: TenantId) -> Vec<&VersionRecord> {
        let committed = self
            .state
            .versions
            .values()
            .filter(|r| !self.version_writes.contains_key(&r.version_id));
        let pending = self.version_writes.values().flatten();
        tenant_records(committed.chain(pending), tenant)
    }
}
