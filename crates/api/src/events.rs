//! Repository lifecycle events
//!
//! Every repository call that succeeds forwards exactly one event to its
//! dispatcher. Event names follow the platform convention:
//!
//! | call | event name |
//! |------|------------|
//! | `search`, `search_detail` | `{entity}.search.result.loaded` |
//! | `aggregate` | `{entity}.aggregation.result.loaded` |
//! | `search_ids` | `{entity}.id.search.result.loaded` |
//! | `read_basic` | `{entity}.basic.loaded` |
//! | `read_detail` | `{entity}.detail.loaded` |
//! | `create`, `update`, `upsert`, `delete` | `generic.entity.written` |
//!
//! `create_version` and `merge` dispatch nothing.

use std::collections::BTreeMap;

use trellis_core::{
    AggregatorResult, BasicCollection, BasicEntity, DetailCollection, DetailEntity, EntityId,
    IdSearchResult, SearchResult, WriteContext, WriteOperation, WrittenEvent,
};

/// Name of the event dispatched after every write call
pub const GENERIC_WRITTEN_EVENT: &str = "generic.entity.written";

// ============================================================================
// GenericWrittenEvent
// ============================================================================

/// Rows affected by one write call, grouped by entity
///
/// Deleted rows are filed under `deleted`; inserted and updated rows
/// (including rows whose foreign key was nulled by a delete) under
/// `written`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericWrittenEvent {
    /// Context of the write call
    pub context: WriteContext,
    /// Inserted and updated rows by entity
    pub written: BTreeMap<String, Vec<WrittenEvent>>,
    /// Deleted rows by entity
    pub deleted: BTreeMap<String, Vec<WrittenEvent>>,
}

impl GenericWrittenEvent {
    /// Group the events returned by the version manager
    pub fn from_events(context: WriteContext, events: Vec<WrittenEvent>) -> Self {
        let mut written: BTreeMap<String, Vec<WrittenEvent>> = BTreeMap::new();
        let mut deleted: BTreeMap<String, Vec<WrittenEvent>> = BTreeMap::new();
        for event in events {
            let target = match event.operation {
                WriteOperation::Delete => &mut deleted,
                WriteOperation::Insert | WriteOperation::Update => &mut written,
            };
            target.entry(event.entity.clone()).or_default().push(event);
        }
        Self {
            context,
            written,
            deleted,
        }
    }

    /// Whether the call affected no row
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.deleted.is_empty()
    }

    /// Ids of `entity` inserted or updated by the call
    pub fn written_ids(&self, entity: &str) -> Vec<EntityId> {
        ids(&self.written, entity)
    }

    /// Ids of `entity` deleted by the call
    pub fn deleted_ids(&self, entity: &str) -> Vec<EntityId> {
        ids(&self.deleted, entity)
    }

    /// Every affected row, written ones first
    pub fn events(&self) -> impl Iterator<Item = &WrittenEvent> {
        self.written.values().chain(self.deleted.values()).flatten()
    }
}

fn ids(groups: &BTreeMap<String, Vec<WrittenEvent>>, entity: &str) -> Vec<EntityId> {
    groups
        .get(entity)
        .map(|events| events.iter().map(|e| e.id).collect())
        .unwrap_or_default()
}

// ============================================================================
// RepositoryEvent
// ============================================================================

/// Event forwarded by a repository after a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent {
    /// `search` returned basic entities
    SearchResultLoaded {
        /// Entity searched
        entity: String,
        /// The assembled result
        result: SearchResult<BasicEntity>,
    },
    /// `search_detail` returned detail entities
    DetailSearchResultLoaded {
        /// Entity searched
        entity: String,
        /// The assembled result
        result: SearchResult<DetailEntity>,
    },
    /// `aggregate` returned
    AggregationResultLoaded {
        /// Entity aggregated
        entity: String,
        /// The aggregations
        result: AggregatorResult,
    },
    /// `search_ids` returned
    IdSearchResultLoaded {
        /// Entity searched
        entity: String,
        /// Ids and total
        result: IdSearchResult,
    },
    /// `read_basic` returned
    BasicLoaded {
        /// Entity read
        entity: String,
        /// Entities read
        collection: BasicCollection,
    },
    /// `read_detail` returned
    DetailLoaded {
        /// Entity read
        entity: String,
        /// Entities read
        collection: DetailCollection,
    },
    /// A write call committed
    Written(GenericWrittenEvent),
}

impl RepositoryEvent {
    /// Dispatch name of the event
    pub fn name(&self) -> String {
        match self {
            RepositoryEvent::SearchResultLoaded { entity, .. }
            | RepositoryEvent::DetailSearchResultLoaded { entity, .. } => {
                format!("{}.search.result.loaded", entity)
            }
            RepositoryEvent::AggregationResultLoaded { entity, .. } => {
                format!("{}.aggregation.result.loaded", entity)
            }
            RepositoryEvent::IdSearchResultLoaded { entity, .. } => {
                format!("{}.id.search.result.loaded", entity)
            }
            RepositoryEvent::BasicLoaded { entity, .. } => format!("{}.basic.loaded", entity),
            RepositoryEvent::DetailLoaded { entity, .. } => format!("{}.detail.loaded", entity),
            RepositoryEvent::Written(_) => GENERIC_WRITTEN_EVENT.to_string(),
        }
    }

    /// Number of entities, ids or rows carried
    pub fn len(&self) -> usize {
        match self {
            RepositoryEvent::SearchResultLoaded { result, .. } => result.entities.len(),
            RepositoryEvent::DetailSearchResultLoaded { result, .. } => result.entities.len(),
            RepositoryEvent::AggregationResultLoaded { result, .. } => result.aggregations.len(),
            RepositoryEvent::IdSearchResultLoaded { result, .. } => result.ids.len(),
            RepositoryEvent::BasicLoaded { collection, .. } => collection.len(),
            RepositoryEvent::DetailLoaded { collection, .. } => collection.len(),
            RepositoryEvent::Written(event) => event.events().count(),
        }
    }

    /// Whether the event carries nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The written event, for write calls
    pub fn as_written(&self) -> Option<&GenericWrittenEvent> {
        match self {
            RepositoryEvent::Written(event) => Some(event),
            _ => None,
        }
    }
}
