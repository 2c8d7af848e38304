//! Typed entity repositories
//!
//! An [`EntityRepository`] is the per-entity facade over the engine. Each
//! call forwards to exactly one engine service pattern and then dispatches
//! one lifecycle event.
//!
//! ## Forwarding
//!
//! | Repository | Engine |
//! |------------|--------|
//! | `search` | `searcher.search` → `reader.read_basic` → `aggregator.aggregate` when requested |
//! | `search_detail` | `searcher.search` → `reader.read_detail_with` → `aggregator.aggregate` when requested |
//! | `search_ids` | `searcher.search` |
//! | `aggregate` | `aggregator.aggregate` |
//! | `read_basic` / `read_detail` | `reader.read_basic` / `reader.read_detail` |
//! | `create` / `update` / `upsert` | `version_manager.insert` / `update` / `upsert` |
//! | `delete` | `version_manager.delete` |
//! | `create_version` / `merge` | `version_manager.create_version` / `merge` |
//!
//! Write and versioning calls take the caller's `ShopContext` and derive
//! the engine's `WriteContext` from it.
//!
//! Errors from the engine are returned unchanged and dispatch nothing.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use trellis_core::{
    AggregatorResult, BasicCollection, BasicEntity, Criteria, DetailCollection, DetailEntity,
    EntityDefinition, EntityId, EntitySchema, IdSearchResult, SearchResult, ShopContext,
    TrellisResult, VersionId, WriteContext, WrittenEvent,
};
use trellis_engine::{Engine, MergeInfo};

use crate::dispatcher::EventDispatcher;
use crate::events::{GenericWrittenEvent, RepositoryEvent};

/// Repository for the entity described by `D`
pub struct EntityRepository<D: EntityDefinition> {
    engine: Engine,
    dispatcher: Arc<dyn EventDispatcher>,
    _definition: PhantomData<fn() -> D>,
}

impl<D: EntityDefinition> Clone for EntityRepository<D> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            _definition: PhantomData,
        }
    }
}

impl<D: EntityDefinition> fmt::Debug for EntityRepository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("entity", &D::ENTITY_NAME)
            .finish()
    }
}

impl<D: EntityDefinition> EntityRepository<D> {
    /// Create a repository over `engine`
    ///
    /// # Errors
    ///
    /// `Schema` when `D` is not registered with the engine.
    pub fn new(engine: Engine, dispatcher: Arc<dyn EventDispatcher>) -> TrellisResult<Self> {
        engine.registry().definition::<D>()?;
        Ok(Self {
            engine,
            dispatcher,
            _definition: PhantomData,
        })
    }

    /// Registered name of the entity
    pub fn entity(&self) -> &'static str {
        D::ENTITY_NAME
    }

    /// The engine this repository forwards to
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn schema(&self) -> TrellisResult<&EntitySchema> {
        self.engine.registry().definition::<D>()
    }

    fn dispatch(&self, event: RepositoryEvent) {
        self.dispatcher.dispatch(&event);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Search and hydrate basic entities, with the requested aggregations
    pub fn search(
        &self,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<SearchResult<BasicEntity>> {
        let schema = self.schema()?;
        let ids = self.engine.searcher().search(schema, criteria, context)?;
        let entities = self.engine.reader().read_basic(schema, &ids.ids, context)?;
        let aggregations = self.aggregations(schema, criteria, context)?;

        let result = SearchResult {
            entities,
            total: ids.total,
            aggregations,
            criteria: criteria.clone(),
            context: context.clone(),
        };
        self.dispatch(RepositoryEvent::SearchResultLoaded {
            entity: D::ENTITY_NAME.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Search and hydrate detail entities
    ///
    /// The criteria's association paths select what is expanded; without
    /// any, every declared association is expanded one level deep.
    pub fn search_detail(
        &self,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<SearchResult<DetailEntity>> {
        let schema = self.schema()?;
        let ids = self.engine.searcher().search(schema, criteria, context)?;
        let reader = self.engine.reader();
        let entities = if criteria.associations().is_empty() {
            reader.read_detail(schema, &ids.ids, context)?
        } else {
            reader.read_detail_with(schema, &ids.ids, context, criteria.associations())?
        };
        let aggregations = self.aggregations(schema, criteria, context)?;

        let result = SearchResult {
            entities,
            total: ids.total,
            aggregations,
            criteria: criteria.clone(),
            context: context.clone(),
        };
        self.dispatch(RepositoryEvent::DetailSearchResultLoaded {
            entity: D::ENTITY_NAME.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    fn aggregations(
        &self,
        schema: &EntitySchema,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<AggregatorResult> {
        if criteria.has_aggregations() {
            self.engine.aggregator().aggregate(schema, criteria, context)
        } else {
            Ok(AggregatorResult::empty(context.clone()))
        }
    }

    /// Ordered ids and total of the matching rows
    pub fn search_ids(
        &self,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<IdSearchResult> {
        let result = self
            .engine
            .searcher()
            .search(self.schema()?, criteria, context)?;
        self.dispatch(RepositoryEvent::IdSearchResultLoaded {
            entity: D::ENTITY_NAME.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Aggregations of the criteria
    pub fn aggregate(
        &self,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<AggregatorResult> {
        let result = self
            .engine
            .aggregator()
            .aggregate(self.schema()?, criteria, context)?;
        self.dispatch(RepositoryEvent::AggregationResultLoaded {
            entity: D::ENTITY_NAME.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Basic entities for `ids`
    pub fn read_basic(
        &self,
        ids: &[EntityId],
        context: &ShopContext,
    ) -> TrellisResult<BasicCollection> {
        let collection = self
            .engine
            .reader()
            .read_basic(self.schema()?, ids, context)?;
        self.dispatch(RepositoryEvent::BasicLoaded {
            entity: D::ENTITY_NAME.to_string(),
            collection: collection.clone(),
        });
        Ok(collection)
    }

    /// Detail entities for `ids`
    pub fn read_detail(
        &self,
        ids: &[EntityId],
        context: &ShopContext,
    ) -> TrellisResult<DetailCollection> {
        let collection = self
            .engine
            .reader()
            .read_detail(self.schema()?, ids, context)?;
        self.dispatch(RepositoryEvent::DetailLoaded {
            entity: D::ENTITY_NAME.to_string(),
            collection: collection.clone(),
        });
        Ok(collection)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert rows
    pub fn create(
        &self,
        payloads: &[serde_json::Value],
        context: &ShopContext,
    ) -> TrellisResult<GenericWrittenEvent> {
        let context = WriteContext::from_shop_context(context);
        let events = self
            .engine
            .version_manager()
            .insert(self.schema()?, payloads, &context)?;
        Ok(self.written(context, events))
    }

    /// Update existing rows
    pub fn update(
        &self,
        payloads: &[serde_json::Value],
        context: &ShopContext,
    ) -> TrellisResult<GenericWrittenEvent> {
        let context = WriteContext::from_shop_context(context);
        let events = self
            .engine
            .version_manager()
            .update(self.schema()?, payloads, &context)?;
        Ok(self.written(context, events))
    }

    /// Insert or update rows
    pub fn upsert(
        &self,
        payloads: &[serde_json::Value],
        context: &ShopContext,
    ) -> TrellisResult<GenericWrittenEvent> {
        let context = WriteContext::from_shop_context(context);
        let events = self
            .engine
            .version_manager()
            .upsert(self.schema()?, payloads, &context)?;
        Ok(self.written(context, events))
    }

    /// Delete rows
    pub fn delete(
        &self,
        ids: &[EntityId],
        context: &ShopContext,
    ) -> TrellisResult<GenericWrittenEvent> {
        let context = WriteContext::from_shop_context(context);
        let events = self
            .engine
            .version_manager()
            .delete(self.schema()?, ids, &context)?;
        Ok(self.written(context, events))
    }

    fn written(&self, context: WriteContext, events: Vec<WrittenEvent>) -> GenericWrittenEvent {
        let event = GenericWrittenEvent::from_events(context, events);
        self.dispatch(RepositoryEvent::Written(event.clone()));
        event
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    /// Branch the row `id` and its owned rows into a version plane
    pub fn create_version(
        &self,
        id: EntityId,
        context: &ShopContext,
        name: Option<&str>,
        version_id: Option<VersionId>,
    ) -> TrellisResult<VersionId> {
        let context = WriteContext::from_shop_context(context);
        self.engine
            .version_manager()
            .create_version(self.schema()?, id, &context, name, version_id)
    }

    /// Fold a version plane into live
    pub fn merge(&self, version_id: VersionId, context: &ShopContext) -> TrellisResult<MergeInfo> {
        let context = WriteContext::from_shop_context(context);
        self.engine.version_manager().merge(version_id, &context)
    }
}
