//! EntitySearcher: criteria to ordered ids
//!
//! Resolves a [`Criteria`] against one entity type in the plane view of
//! the context's version: filter, sort (ties by id ascending), then
//! paginate. The total is counted before pagination.

use std::sync::Arc;

use tracing::debug;
use trellis_core::{Criteria, EntitySchema, IdSearchResult, ShopContext, TrellisResult};

use crate::engine::EngineInner;
use crate::query::CompiledCriteria;

/// Stateless search handle over the engine
#[derive(Clone)]
pub struct EntitySearcher {
    inner: Arc<EngineInner>,
}

impl EntitySearcher {
    pub(crate) fn new(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    /// Ids of `schema` matching `criteria`, in sort order
    ///
    /// The limit applied is the criteria's limit capped by the configured
    /// `max_limit`.
    ///
    /// # Errors
    ///
    /// `InvalidCriteria` for unknown paths, to-many sort paths and
    /// operators that do not fit the field type; `Schema` for an
    /// unregistered entity.
    pub fn search(
        &self,
        schema: &EntitySchema,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<IdSearchResult> {
        self.inner.check_registered(schema)?;
        let compiled = CompiledCriteria::compile(&self.inner.registry, schema, criteria)?;

        let view = self.inner.store.view();
        let scope = self.inner.scope(&view, context);

        let matching = compiled.matching(&scope);
        let total = matching.len();
        let sorted = compiled.sort(&scope, matching);

        let limit = self.inner.config.effective_limit(criteria.get_limit());
        let ids: Vec<_> = sorted
            .into_iter()
            .skip(criteria.get_offset())
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| row.id)
            .collect();

        debug!(
            target: "trellis::search",
            entity = %schema.entity,
            version = %context.version_id,
            total,
            returned = ids.len(),
            "search"
        );

        Ok(IdSearchResult {
            ids,
            total,
            criteria: criteria.clone(),
            context: context.clone(),
        })
    }
}
