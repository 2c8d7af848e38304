//! VersionManager: the mutation authority
//!
//! Every call runs in one store transaction and either commits as a whole
//! or leaves the store untouched.
//!
//! ## Planes
//!
//! Writes land in the plane of the write context. In a version plane an
//! update first copies the visible (live) row into the plane, a delete
//! leaves a tombstone over the live row. `create_version` copies a live
//! row and its owned rows (translations, cascading one-to-many children)
//! into a plane; `merge` folds the plane back into live and drops it.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::info;
use trellis_core::{
    AssociationKind, EntityId, EntitySchema, SchemaRegistry, TenantId, TrellisError,
    TrellisResult, VersionId, WriteContext, WrittenEvent,
};
use trellis_storage::{RowKey, RowSource, StoredRow, Transaction, VersionRecord};

use crate::engine::EngineInner;
use crate::merge::{MergeInfo, MergePlan};
use crate::writer::{WriteMode, WriteSession};

/// Stateless write handle over the engine
#[derive(Clone)]
pub struct VersionManager {
    inner: Arc<EngineInner>,
}

impl VersionManager {
    pub(crate) fn new(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert new rows
    ///
    /// # Errors
    ///
    /// `Validation` for malformed payloads, unknown fields, missing
    /// required fields or an id that already exists; `EntityNotFound` when
    /// a foreign key points at a missing row.
    pub fn insert(
        &self,
        schema: &EntitySchema,
        payloads: &[serde_json::Value],
        context: &WriteContext,
    ) -> TrellisResult<Vec<WrittenEvent>> {
        self.write(schema, payloads, context, WriteMode::Insert)
    }

    /// Update existing rows; every payload must carry an `id`
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert), plus `EntityNotFound` when the row is
    /// not visible in the plane.
    pub fn update(
        &self,
        schema: &EntitySchema,
        payloads: &[serde_json::Value],
        context: &WriteContext,
    ) -> TrellisResult<Vec<WrittenEvent>> {
        self.write(schema, payloads, context, WriteMode::Update)
    }

    /// Insert or update each row by its existence in the plane view
    pub fn upsert(
        &self,
        schema: &EntitySchema,
        payloads: &[serde_json::Value],
        context: &WriteContext,
    ) -> TrellisResult<Vec<WrittenEvent>> {
        self.write(schema, payloads, context, WriteMode::Upsert)
    }

    fn write(
        &self,
        schema: &EntitySchema,
        payloads: &[serde_json::Value],
        context: &WriteContext,
        mode: WriteMode,
    ) -> TrellisResult<Vec<WrittenEvent>> {
        self.inner.check_registered(schema)?;
        let registry: &SchemaRegistry = &self.inner.registry;

        let events = self.inner.store.transaction(|txn| {
            let mut session = WriteSession::new(txn, registry, context);
            for payload in payloads {
                session.write(schema, payload, mode)?;
            }
            Ok(session.finish())
        })?;

        info!(
            target: "trellis::version",
            entity = %schema.entity,
            version = %context.version_id,
            mode = ?mode,
            payloads = payloads.len(),
            rows = events.len(),
            "write committed"
        );
        Ok(events)
    }

    /// Delete rows in the context's plane, handling dependents per their
    /// delete behaviour; ids that do not exist are skipped
    ///
    /// # Errors
    ///
    /// `ForeignKeyConstraint` when a `Restrict` dependent still references
    /// a deleted row.
    pub fn delete(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &WriteContext,
    ) -> TrellisResult<Vec<WrittenEvent>> {
        self.inner.check_registered(schema)?;
        let registry: &SchemaRegistry = &self.inner.registry;

        let events = self.inner.store.transaction(|txn| {
            let mut session = WriteSession::new(txn, registry, context);
            for id in ids {
                session.delete(schema, *id)?;
            }
            Ok(session.finish())
        })?;

        info!(
            target: "trellis::version",
            entity = %schema.entity,
            version = %context.version_id,
            requested = ids.len(),
            rows = events.len(),
            "delete committed"
        );
        Ok(events)
    }

    // ========================================================================
    // Branching
    // ========================================================================

    /// Copy a live row and its owned rows into a version plane
    ///
    /// Uses `version_id` when given (adding the row to an existing plane)
    /// and a fresh id otherwise. Rows already present in the plane are kept
    /// as they are.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when `id` does not exist live; `Validation` when
    /// `version_id` is the live plane or another tenant's version.
    pub fn create_version(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        context: &WriteContext,
        name: Option<&str>,
        version_id: Option<VersionId>,
    ) -> TrellisResult<VersionId> {
        self.inner.check_registered(schema)?;
        let version = version_id.unwrap_or_else(VersionId::new);
        if version.is_live() {
            return Err(TrellisError::validation(
                &schema.entity,
                "version_id",
                "cannot branch into the live plane",
            ));
        }
        let registry: &SchemaRegistry = &self.inner.registry;
        let tenant = context.tenant_id;

        let copied = self.inner.store.transaction(|txn| {
            if txn
                .visible(tenant, &schema.entity, id, VersionId::LIVE)
                .is_none()
            {
                return Err(TrellisError::entity_not_found(&schema.entity, id));
            }
            match txn.version_record(&version).map(|record| record.tenant) {
                Some(owner) if owner != tenant => {
                    return Err(TrellisError::validation(
                        &schema.entity,
                        "version_id",
                        "version belongs to another tenant",
                    ));
                }
                Some(_) => {}
                None => {
                    let record = VersionRecord {
                        version_id: version,
                        tenant,
                        name: name.map(str::to_string),
                        created_at: txn.now(),
                    };
                    txn.put_version_record(record);
                }
            }
            let mut visited = FxHashSet::default();
            let plane = PlaneCopy {
                registry,
                tenant,
                version,
            };
            plane.copy_owned(txn, schema, id, &mut visited)
        })?;

        info!(
            target: "trellis::version",
            entity = %schema.entity,
            %id,
            version = %version,
            rows = copied,
            "version created"
        );
        Ok(version)
    }

    /// Fold a version plane into live and drop it
    ///
    /// Rows of the plane that differ from live overwrite their live
    /// counterparts (or are inserted), tombstones delete the live row with the live delete
    /// rules. Then every row of the plane and its record are removed.
    ///
    /// # Errors
    ///
    /// `VersionNotFound` when the plane has neither rows nor a record in the
    /// context's tenant;
    /// `ForeignKeyConstraint` when a tombstoned row is still restricted in
    /// live.
    pub fn merge(&self, version_id: VersionId, context: &WriteContext) -> TrellisResult<MergeInfo> {
        if version_id.is_live() {
            return Err(TrellisError::VersionNotFound { version_id });
        }
        let registry: &SchemaRegistry = &self.inner.registry;
        let live = context.with_version(VersionId::LIVE);
        let tenant = context.tenant_id;

        let info = self.inner.store.transaction(|txn| {
            let has_record = txn
                .version_record(&version_id)
                .is_some_and(|record| record.tenant == tenant);
            let rows: Vec<(RowKey, StoredRow)> = txn
                .plane_keys(version_id)
                .into_iter()
                .filter(|key| key.tenant == tenant)
                .filter_map(|key| txn.row(&key).cloned().map(|row| (key, row)))
                .collect();
            if !has_record && rows.is_empty() {
                return Err(TrellisError::VersionNotFound { version_id });
            }

            let plan = MergePlan::build(rows);
            let mut rows_applied = 0;
            let mut rows_deleted = 0;

            let mut session = WriteSession::new(txn, registry, &live);
            for upsert in plan.upserts {
                if session.apply_merged(upsert) {
                    rows_applied += 1;
                }
            }
            for (entity, id) in &plan.deletes {
                if session.delete(registry.schema(entity)?, *id)? {
                    rows_deleted += 1;
                }
            }
            let events = session.finish();

            for key in plan.removals {
                txn.remove(key);
            }
            if has_record {
                txn.remove_version_record(version_id);
            }

            Ok(MergeInfo {
                version_id,
                rows_applied,
                rows_deleted,
                events,
            })
        })?;

        info!(
            target: "trellis::version",
            version = %version_id,
            rows_applied = info.rows_applied,
            rows_deleted = info.rows_deleted,
            events = info.events.len(),
            "version merged"
        );
        Ok(info)
    }

    /// Version records of the context's tenant, oldest first
    pub fn versions(&self, context: &WriteContext) -> Vec<VersionRecord> {
        self.inner
            .store
            .view()
            .version_records(context.tenant_id)
            .into_iter()
            .cloned()
            .collect()
    }
}

/// Target of a `create_version` copy
struct PlaneCopy<'r> {
    registry: &'r SchemaRegistry,
    tenant: TenantId,
    version: VersionId,
}

impl PlaneCopy<'_> {
    /// Copy the live row `id` and, recursively, its owned rows; returns the
    /// number of rows written
    fn copy_owned(
        &self,
        txn: &mut Transaction<'_>,
        schema: &EntitySchema,
        id: EntityId,
        visited: &mut FxHashSet<(String, EntityId)>,
    ) -> TrellisResult<usize> {
        if !visited.insert((schema.entity.clone(), id)) {
            return Ok(0);
        }
        let live_key = RowKey::new(self.tenant, &schema.entity, VersionId::LIVE, id);
        let Some(mut row) = txn.row(&live_key).filter(|r| !r.tombstone).cloned() else {
            return Ok(0);
        };

        let mut copied = 0;
        let version_key = live_key.in_plane(self.version);
        if txn.row(&version_key).is_none() {
            row.commit_seq = 0;
            txn.put_row(version_key, row);
            copied += 1;
        }

        for association in self.registry.owned_associations(schema) {
            let (reference, foreign_key) = match &association.kind {
                AssociationKind::OneToMany {
                    reference,
                    foreign_key,
                }
                | AssociationKind::Translations {
                    reference,
                    foreign_key,
                    ..
                } => (reference, foreign_key),
                AssociationKind::ManyToOne { .. } => continue,
            };
            let child_schema = self.registry.schema(reference)?;
            let children: Vec<EntityId> = txn
                .plane_rows(self.tenant, reference, VersionId::LIVE)
                .into_iter()
                .filter(|(_, r)| {
                    !r.tombstone
                        && r.get(foreign_key).as_str().and_then(EntityId::parse) == Some(id)
                })
                .map(|(child, _)| child)
                .collect();
            for child in children {
                copied += self.copy_owned(txn, child_schema, child, visited)?;
            }
        }
        Ok(copied)
    }
}
