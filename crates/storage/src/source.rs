//! Read access shared by committed views and open transactions
//!
//! [`RowSource`] exposes the raw rows of a plane. Its provided methods
//! implement the plane view on top of them: the view of a version plane `V`
//! is the live rows overlaid by the rows tagged `V`, where a tombstone
//! tagged `V` hides the live row. The live plane's view is just its rows.
//!
//! Both [`StoreView`](crate::StoreView) (last-committed state) and
//! [`Transaction`](crate::Transaction) (committed state plus its own
//! pending writes) implement the trait, so the engine resolves planes the
//! same way on the read and the write path.

use crate::row::{RowKey, StoredRow, VersionRecord, VisibleRow};
use std::collections::BTreeMap;
use trellis_core::{EntityId, TenantId, VersionId};

/// Raw row access plus plane resolution
pub trait RowSource {
    /// Physical row stored under `key`, tombstones included
    fn row(&self, key: &RowKey) -> Option<&StoredRow>;

    /// Physical rows of one entity in one plane, ordered by id
    fn plane_rows(
        &self,
        tenant: TenantId,
        entity: &str,
        version: VersionId,
    ) -> Vec<(EntityId, &StoredRow)>;

    /// Every key tagged with a non-live `version`, across entities, sorted
    fn plane_keys(&self, version: VersionId) -> Vec<RowKey>;

    /// Record of a version plane
    fn version_record(&self, version: &VersionId) -> Option<&VersionRecord>;

    /// Version records of a tenant, ordered by creation time then id
    fn version_records(&self, tenant: TenantId) -> Vec<&VersionRecord>;

    /// Whether a version plane exists: it has a record or at least one row
    fn version_exists(&self, version: VersionId) -> bool {
        version.is_live()
            || self.version_record(&version).is_some()
            || !self.plane_keys(version).is_empty()
    }

    /// Row of `id` as seen through the view of `plane`
    fn visible(
        &self,
        tenant: TenantId,
        entity: &str,
        id: EntityId,
        plane: VersionId,
    ) -> Option<VisibleRow<'_>> {
        if !plane.is_live() {
            let key = RowKey::new(tenant, entity, plane, id);
            if let Some(row) = self.row(&key) {
                if row.tombstone {
                    return None;
                }
                return Some(VisibleRow {
                    id,
                    version_id: plane,
                    row,
                });
            }
        }
        let key = RowKey::new(tenant, entity, VersionId::LIVE, id);
        self.row(&key)
            .filter(|row| !row.tombstone)
            .map(|row| VisibleRow {
                id,
                version_id: VersionId::LIVE,
                row,
            })
    }

    /// Every row of `entity` as seen through the view of `plane`, by id
    fn visible_rows(&self, tenant: TenantId, entity: &str, plane: VersionId) -> Vec<VisibleRow<'_>> {
        let live = self.plane_rows(tenant, entity, VersionId::LIVE);
        if plane.is_live() {
            return live
                .into_iter()
                .filter(|(_, row)| !row.tombstone)
                .map(|(id, row)| VisibleRow {
                    id,
                    version_id: VersionId::LIVE,
                    row,
                })
                .collect();
        }

        let mut merged: BTreeMap<EntityId, VisibleRow<'_>> = live
            .into_iter()
            .filter(|(_, row)| !row.tombstone)
            .map(|(id, row)| {
                (
                    id,
                    VisibleRow {
                        id,
                        version_id: VersionId::LIVE,
                        row,
                    },
                )
            })
            .collect();
        for (id, row) in self.plane_rows(tenant, entity, plane) {
            if row.tombstone {
                merged.remove(&id);
            } else {
                merged.insert(
                    id,
                    VisibleRow {
                        id,
                        version_id: plane,
                        row,
                    },
                );
            }
        }
        merged.into_values().collect()
    }
}

/// Sorted version records of `tenant` from an iterator of records
pub(crate) fn tenant_records<'a>(
    records: impl Iterator<Item = &'a VersionRecord>,
    tenant: TenantId,
) -> Vec<&'a VersionRecord> {
    let mut out: Vec<_> = records.filter(|r| r.tenant == tenant).collect();
    out.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.version_id.cmp(&b.version_id))
    });
    out
}
