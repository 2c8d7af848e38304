//! Merge planning
//!
//! A merge folds a version plane back into live. Planning is a pure
//! function of the plane's rows: every row becomes an upsert into live,
//! every tombstone a live delete, and every key of the plane is scheduled
//! for removal. Applying the plan is the version manager's job.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use trellis_core::{EntityId, Value, VersionId, WrittenEvent};
use trellis_storage::{RowKey, StoredRow};

/// A version row to write into live
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MergeUpsert {
    pub(crate) entity: String,
    pub(crate) id: EntityId,
    pub(crate) fields: BTreeMap<String, Value>,
    pub(crate) created_at: DateTime<Utc>,
}

/// What applying a version plane to live consists of
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MergePlan {
    /// Rows to write into live, in key order
    pub(crate) upserts: Vec<MergeUpsert>,
    /// `(entity, id)` pairs to delete from live, in key order
    pub(crate) deletes: Vec<(String, EntityId)>,
    /// Every key of the plane
    pub(crate) removals: Vec<RowKey>,
}

impl MergePlan {
    /// Plan the merge of the given plane rows
    pub(crate) fn build(rows: impl IntoIterator<Item = (RowKey, StoredRow)>) -> Self {
        let mut rows: Vec<_> = rows.into_iter().collect();
        rows.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut plan = Self::default();
        for (key, row) in rows {
            if row.tombstone {
                plan.deletes.push((key.entity.clone(), key.id));
            } else {
                plan.upserts.push(MergeUpsert {
                    entity: key.entity.clone(),
                    id: key.id,
                    fields: row.fields,
                    created_at: row.created_at,
                });
            }
            plan.removals.push(key);
        }
        plan
    }

}

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeInfo {
    /// The merged version
    pub version_id: VersionId,
    /// Version rows written into live (rows equal to live are skipped)
    pub rows_applied: usize,
    /// Live rows deleted because of tombstones (cascades not counted)
    pub rows_deleted: usize,
    /// Every live row affected, cascades included
    pub events: Vec<WrittenEvent>,
}
