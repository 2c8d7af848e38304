//! Result types returned by the read and write paths
//!
//! - [`IdSearchResult`]: ordered ids plus unpaginated total
//! - [`EntityCollection`]: ordered id → entity map ([`BasicCollection`],
//!   [`DetailCollection`])
//! - [`AggregatorResult`]: named aggregation values
//! - [`SearchResult`]: what a repository assembles from the three above
//! - [`WrittenEvent`]: one affected row of a write call
//!
//! All of them are owned by the caller; nothing is cached.

use crate::context::ShopContext;
use crate::criteria::Criteria;
use crate::types::{EntityId, VersionId};
use crate::value::Value;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Search
// ============================================================================

/// Ordered primary keys matching a criteria
#[derive(Debug, Clone, PartialEq)]
pub struct IdSearchResult {
    /// Matching ids in sort order, after pagination
    pub ids: Vec<EntityId>,
    /// Number of matches before pagination
    pub total: usize,
    /// Criteria that produced this result
    pub criteria: Criteria,
    /// Context the search ran in
    pub context: ShopContext,
}

impl IdSearchResult {
    /// Whether no ids were returned
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Anything with a primary key
pub trait Identified {
    /// Primary key
    fn id(&self) -> EntityId;
}

/// A hydrated row: own fields plus resolved translated fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicEntity {
    /// Primary key
    pub id: EntityId,
    /// Plane the visible row belongs to
    pub version_id: VersionId,
    /// Field values keyed by field name; translated fields hold the value of
    /// the first language of the fallback chain that has one
    pub fields: BTreeMap<String, Value>,
    /// When the row was first written
    pub created_at: DateTime<Utc>,
    /// When the row was last written
    pub updated_at: DateTime<Utc>,
}

impl BasicEntity {
    /// Value of `field`, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String value of `field`
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Integer value of `field`
    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    /// Foreign key value of `field`
    pub fn get_id(&self, field: &str) -> Option<EntityId> {
        self.get_str(field).and_then(EntityId::parse)
    }
}

impl Identified for BasicEntity {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Resolved association of a detail entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssociationValue {
    /// Many-to-one target (absent when the key is null or dangling)
    One(Option<Box<DetailEntity>>),
    /// To-many rows
    Many(Vec<DetailEntity>),
}

impl AssociationValue {
    /// The single target of a many-to-one association
    pub fn as_one(&self) -> Option<&DetailEntity> {
        match self {
            AssociationValue::One(entity) => entity.as_deref(),
            AssociationValue::Many(_) => None,
        }
    }

    /// The rows of a to-many association
    pub fn as_many(&self) -> &[DetailEntity] {
        match self {
            AssociationValue::Many(entities) => entities,
            AssociationValue::One(_) => &[],
        }
    }
}

/// A hydrated row with resolved associations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailEntity {
    /// Row fields
    pub basic: BasicEntity,
    /// Resolved associations keyed by association name
    pub associations: BTreeMap<String, AssociationValue>,
}

impl DetailEntity {
    /// Value of `field`, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.basic.get(field)
    }

    /// Resolved association by name
    pub fn association(&self, name: &str) -> Option<&AssociationValue> {
        self.associations.get(name)
    }
}

impl Identified for DetailEntity {
    fn id(&self) -> EntityId {
        self.basic.id
    }
}

/// Ordered map id → entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection<E> {
    entities: Vec<E>,
    positions: FxHashMap<EntityId, usize>,
}

/// Collection of basic entities
pub type BasicCollection = EntityCollection<BasicEntity>;

/// Collection of detail entities
pub type DetailCollection = EntityCollection<DetailEntity>;

impl<E: Identified> EntityCollection<E> {
    /// Empty collection
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            positions: FxHashMap::default(),
        }
    }

    /// Append an entity; an id already present is replaced in place
    pub fn push(&mut self, entity: E) {
        let id = entity.id();
        match self.positions.get(&id) {
            Some(&pos) => self.entities[pos] = entity,
            None => {
                self.positions.insert(id, self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    /// Entity with `id`
    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.positions.get(id).map(|&pos| &self.entities[pos])
    }

    /// Whether `id` is present
    pub fn contains(&self, id: &EntityId) -> bool {
        self.positions.contains_key(id)
    }

    /// Ids in collection order
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Identified::id).collect()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// First entity
    pub fn first(&self) -> Option<&E> {
        self.entities.first()
    }

    /// Iterate in collection order
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entities.iter()
    }

    /// Consume into a vector in collection order
    pub fn into_vec(self) -> Vec<E> {
        self.entities
    }
}

impl<E: Identified> Default for EntityCollection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Identified> FromIterator<E> for EntityCollection<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut collection = Self::new();
        for entity in iter {
            collection.push(entity);
        }
        collection
    }
}

impl<E> IntoIterator for EntityCollection<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EntityCollection<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

// ============================================================================
// Aggregations
// ============================================================================

/// One group of a grouped aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Group key
    pub key: Value,
    /// Number of entities in the group
    pub count: u64,
    /// Sum of the summed field (grouped sums only)
    pub sum: Option<Value>,
}

/// Computed value of one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregationValue {
    /// Entity count
    Count(u64),
    /// Sum, average, minimum or maximum (`Null` when there is nothing to aggregate)
    Scalar(Value),
    /// Distinct values, ascending
    Values(Vec<Value>),
    /// Groups, ascending by key
    Buckets(Vec<Bucket>),
}

/// Aggregations computed for a criteria
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorResult {
    /// Values keyed by aggregation name
    pub aggregations: BTreeMap<String, AggregationValue>,
    /// Context the aggregation ran in
    pub context: ShopContext,
}

impl AggregatorResult {
    /// Empty result for `context`
    pub fn empty(context: ShopContext) -> Self {
        Self {
            aggregations: BTreeMap::new(),
            context,
        }
    }

    /// Value of the aggregation named `name`
    pub fn get(&self, name: &str) -> Option<&AggregationValue> {
        self.aggregations.get(name)
    }

    /// Scalar value of the aggregation named `name`
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(AggregationValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    /// Count of the aggregation named `name`
    pub fn count(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(AggregationValue::Count(c)) => Some(*c),
            _ => None,
        }
    }
}

/// Entities, total and aggregations of one repository search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<E> {
    /// Hydrated entities in search order
    pub entities: EntityCollection<E>,
    /// Number of matches before pagination
    pub total: usize,
    /// Requested aggregations (empty when none were requested)
    pub aggregations: AggregatorResult,
    /// Criteria that produced this result
    pub criteria: Criteria,
    /// Context the search ran in
    pub context: ShopContext,
}

// ============================================================================
// Writes
// ============================================================================

/// Kind of change applied to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteOperation {
    /// Row created
    Insert,
    /// Row changed
    Update,
    /// Row removed (or tombstoned in a version plane)
    Delete,
}

/// One row affected by a write call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WrittenEvent {
    /// Entity name
    pub entity: String,
    /// Primary key
    pub id: EntityId,
    /// Plane written
    pub version_id: VersionId,
    /// Kind of change
    pub operation: WriteOperation,
}

impl WrittenEvent {
    /// Create a written event
    pub fn new(
        entity: impl Into<String>,
        id: EntityId,
        version_id: VersionId,
        operation: WriteOperation,
    ) -> Self {
        Self {
            entity: entity.into(),
            id,
            version_id,
            operation,
        }
    }
}
