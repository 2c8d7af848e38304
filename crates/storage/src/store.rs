//! RowStore: in-memory transactional row storage
//!
//! This module implements the row store using:
//! - `BTreeMap<RowKey, StoredRow>` for ordered row storage
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing commit sequences
//! - A plane index for efficient version-plane queries
//!
//! # Concurrency Model
//!
//! - **Readers** take a read guard ([`RowStore::view`]) and see the
//!   last-committed state for as long as they hold it.
//! - **Writers** open a [`Transaction`], which holds the lock's single
//!   upgradable read guard. Writers are therefore serialized, while readers
//!   keep running alongside them.
//! - **Commit** upgrades the guard and applies the whole write set under
//!   one write-lock acquisition, so no reader ever observes a partial batch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;
use trellis_core::{EntityId, TenantId, TrellisResult, VersionId};

use crate::index::PlaneIndex;
use crate::row::{RowKey, StoredRow, VersionRecord};
use crate::source::{tenant_records, RowSource};
use crate::transaction::Transaction;

/// Committed state guarded by the store lock
#[derive(Debug, Default)]
pub struct StoreState {
    /// The main data store: ordered map from RowKey to StoredRow
    pub(crate) rows: BTreeMap<RowKey, StoredRow>,
    /// Version plane records by id
    pub(crate) versions: BTreeMap<VersionId, VersionRecord>,
    /// Secondary index: VersionId → Keys
    pub(crate) plane_index: PlaneIndex,
}

impl StoreState {
    pub(crate) fn plane_rows(
        &self,
        tenant: TenantId,
        entity: &str,
        version: VersionId,
    ) -> Vec<(EntityId, &StoredRow)> {
        self.rows
            .range(RowKey::range_start(tenant, entity, version)..)
            .take_while(|(k, _)| k.in_range(tenant, entity, version))
            .map(|(k, row)| (k.id, row))
            .collect()
    }

    /// Apply a write set atomically
    ///
    /// `Some(row)` inserts or replaces, `None` removes. Every inserted row
    /// is stamped with `commit_seq`.
    pub(crate) fn apply_batch(
        &mut self,
        writes: BTreeMap<RowKey, Option<StoredRow>>,
        version_writes: BTreeMap<VersionId, Option<VersionRecord>>,
        commit_seq: u64,
    ) -> BatchStats {
        let mut stats = BatchStats::default();

        for (key, write) in writes {
            match write {
                Some(mut row) => {
                    row.commit_seq = commit_seq;
                    self.plane_index.insert(key.clone());
                    self.rows.insert(key, row);
                    stats.rows_written += 1;
                }
                None => {
                    if self.rows.remove(&key).is_some() {
                        self.plane_index.remove(&key);
                        stats.rows_removed += 1;
                    }
                }
            }
        }

        for (version, record) in version_writes {
            match record {
                Some(record) => {
                    self.versions.insert(version, record);
                }
                None => {
                    self.versions.remove(&version);
                }
            }
        }

        stats
    }
}

/// Counts of one applied batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Rows inserted or replaced
    pub rows_written: usize,
    /// Rows physically removed
    pub rows_removed: usize,
}

/// Outcome of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Sequence number assigned to the batch (unchanged for empty commits)
    pub commit_seq: u64,
    /// Rows inserted, replaced or removed
    pub stats: BatchStats,
}

/// In-memory transactional row store
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`.
#[derive(Debug, Default)]
pub struct RowStore {
    state: RwLock<StoreState>,
    commit_seq: AtomicU64,
}

impl RowStore {
    /// Create a new empty RowStore
    ///
    /// Initial commit sequence is 0 (no writes have occurred).
    pub fn new() -> Self {
        Self::default()
    }

    /// Read view over the last-committed state
    ///
    /// Holds a read guard until dropped. Commits wait for outstanding views,
    /// so keep views short-lived.
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            state: self.state.read(),
        }
    }

    /// Begin a write transaction
    ///
    /// Blocks while another transaction is open.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, self.state.upgradable_read())
    }

    /// Run `f` inside a transaction
    ///
    /// The write set is committed when `f` returns `Ok` and discarded when
    /// it returns `Err`.
    ///
    /// ```ignore
    /// let store = RowStore::new();
    /// store.transaction(|txn| {
    ///     txn.put(key, fields);
    ///     Ok(())
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> TrellisResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> TrellisResult<T>,
    {
        let mut txn = self.begin();
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(
                    target: "trellis::storage",
                    pending = txn.pending(),
                    "transaction rolled back"
                );
                Err(e)
            }
        }
    }

    /// Sequence number of the last committed batch
    pub fn current_commit_seq(&self) -> u64 {
        self.commit_seq.load(Ordering::SeqCst)
    }

    /// Allocate the next commit sequence
    pub(crate) fn next_commit_seq(&self) -> u64 {
        self.commit_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of physical rows across all planes
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Whether the store holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read guard over the last-committed state
pub struct StoreView<'a> {
    state: RwLockReadGuard<'a, StoreState>,
}

impl RowSource for StoreView<'_> {
    fn row(&self, key: &RowKey) -> Option<&StoredRow> {
        self.state.rows.get(key)
    }

    fn plane_rows(
        &self,
        tenant: TenantId,
        entity: &str,
        version: VersionId,
    ) -> Vec<(EntityId, &StoredRow)> {
        self.state.plane_rows(tenant, entity, version)
    }

    fn plane_keys(&self, version: VersionId) -> Vec<RowKey> {
        let mut keys: Vec<RowKey> = self
            .state
            .plane_index
            .get(&version)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn version_record(&self, version: &VersionId) -> Option<&VersionRecord> {
        self.state.versions.get(version)
    }

    fn version_records(&self, tenant: TenantId) -> Vec<&VersionRecord> {
        tenant_records(self.state.versions.values(), tenant)
    }
}
