//! Row keys and stored rows
//!
//! Every row is keyed by `(tenant, entity, version, id)`. The version is
//! part of the key, so the live plane and every version plane hold separate
//! physical rows for the same entity id. Keys order by tenant, then entity,
//! then plane, then id, which makes "all rows of one entity in one plane" a
//! contiguous range of the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trellis_core::{EntityId, TenantId, Value, VersionId};

/// Composite key of a stored row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    /// Tenant scope
    pub tenant: TenantId,
    /// Entity name
    pub entity: String,
    /// Plane the row belongs to
    pub version: VersionId,
    /// Primary key
    pub id: EntityId,
}

impl RowKey {
    /// Create a row key
    pub fn new(tenant: TenantId, entity: impl Into<String>, version: VersionId, id: EntityId) -> Self {
        Self {
            tenant,
            entity: entity.into(),
            version,
            id,
        }
    }

    /// Key of the same row in the live plane
    pub fn live(&self) -> Self {
        self.in_plane(VersionId::LIVE)
    }

    /// Key of the same row in another plane
    pub fn in_plane(&self, version: VersionId) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Smallest key of the `(tenant, entity, version)` range
    pub(crate) fn range_start(tenant: TenantId, entity: &str, version: VersionId) -> Self {
        Self::new(tenant, entity, version, EntityId::from_uuid(uuid::Uuid::nil()))
    }

    /// Whether this key lies in the `(tenant, entity, version)` range
    pub(crate) fn in_range(&self, tenant: TenantId, entity: &str, version: VersionId) -> bool {
        self.tenant == tenant && self.entity == entity && self.version == version
    }
}

/// A row as held by the store
///
/// A tombstone marks a row deleted inside a version plane; it hides the
/// live row of the same id in that plane's view and carries no fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Field values (translated fields live on the translation rows)
    pub fields: BTreeMap<String, Value>,
    /// Deleted within a version plane
    pub tombstone: bool,
    /// When the row was first written in its plane (copies keep the source's)
    pub created_at: DateTime<Utc>,
    /// When the row was last written
    pub updated_at: DateTime<Utc>,
    /// Commit sequence of the batch that wrote the row (0 while pending)
    pub commit_seq: u64,
}

impl StoredRow {
    /// A pending row with the given fields
    pub fn new(fields: BTreeMap<String, Value>, now: DateTime<Utc>) -> Self {
        Self {
            fields,
            tombstone: false,
            created_at: now,
            updated_at: now,
            commit_seq: 0,
        }
    }

    /// A pending tombstone
    pub fn tombstone(now: DateTime<Utc>) -> Self {
        Self {
            fields: BTreeMap::new(),
            tombstone: true,
            created_at: now,
            updated_at: now,
            commit_seq: 0,
        }
    }

    /// Value of `field`; absent fields read as `Null`
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }
}

/// Metadata of a version plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Plane id
    pub version_id: VersionId,
    /// Tenant that created the plane
    pub tenant: TenantId,
    /// Optional human-readable name
    pub name: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A row as seen through a plane view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRow<'a> {
    /// Primary key
    pub id: EntityId,
    /// Plane the physical row belongs to (live or the viewed version)
    pub version_id: VersionId,
    /// The row
    pub row: &'a StoredRow,
}
