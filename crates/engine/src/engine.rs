//! Engine: shared state behind the four services
//!
//! An [`Engine`] owns the schema registry, the row store, the configuration
//! and the locale fallback policy. The services it hands out
//! ([`EntitySearcher`], [`EntityReader`], [`EntityAggregator`],
//! [`VersionManager`]) are stateless handles over the same shared state and
//! are cheap to clone.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use trellis_core::{
    EntitySchema, LanguageId, SchemaRegistry, ShopContext, TrellisError, TrellisResult,
};
use trellis_storage::{RowSource, RowStore};

use crate::aggregator::EntityAggregator;
use crate::config::EngineConfig;
use crate::locale::{ContextFallback, LocaleFallback};
use crate::reader::EntityReader;
use crate::scope::ReadScope;
use crate::searcher::EntitySearcher;
use crate::version_manager::VersionManager;

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct EngineInner {
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) store: RowStore,
    pub(crate) config: EngineConfig,
    system_language: LanguageId,
    locale: Box<dyn LocaleFallback>,
}

impl EngineInner {
    /// Languages consulted for translated fields in `context`
    pub(crate) fn language_chain(&self, context: &ShopContext) -> Vec<LanguageId> {
        self.locale.chain(context, &self.system_language)
    }

    /// Read scope over `source` for the plane and tenant of `context`
    pub(crate) fn scope<'a>(
        &'a self,
        source: &'a dyn RowSource,
        context: &ShopContext,
    ) -> ReadScope<'a> {
        ReadScope::new(
            source,
            context.tenant_id,
            context.version_id,
            self.language_chain(context),
        )
    }

    /// Fail unless `schema` belongs to the registry
    pub(crate) fn check_registered(&self, schema: &EntitySchema) -> TrellisResult<()> {
        if self.registry.contains(&schema.entity) {
            Ok(())
        } else {
            Err(TrellisError::Schema(format!(
                "entity '{}' is not registered",
                schema.entity
            )))
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Entry point of the entity engine
///
/// # Example
///
/// ```ignore
/// use trellis_engine::Engine;
///
/// let engine = Engine::builder()
///     .registry(trellis_core::testing::catalog())
///     .build()?;
///
/// let product = engine.registry().schema("product")?;
/// let ids = engine.searcher().search(product, &Criteria::new(), &ShopContext::default())?;
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Start configuring an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Id resolution for criteria
    pub fn searcher(&self) -> EntitySearcher {
        EntitySearcher::new(Arc::clone(&self.inner))
    }

    /// Entity hydration
    pub fn reader(&self) -> EntityReader {
        EntityReader::new(Arc::clone(&self.inner))
    }

    /// Aggregation evaluation
    pub fn aggregator(&self) -> EntityAggregator {
        EntityAggregator::new(Arc::clone(&self.inner))
    }

    /// Writes, branching and merging
    pub fn version_manager(&self) -> VersionManager {
        VersionManager::new(Arc::clone(&self.inner))
    }

    /// The schema registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The underlying row store
    pub fn store(&self) -> &RowStore {
        &self.inner.store
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.inner.registry.entities().count())
            .field("rows", &self.inner.store.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Engine`]
///
/// A registry is required. Configuration comes from, in order of
/// precedence: a config file, an explicit [`EngineConfig`], the defaults.
#[derive(Default)]
pub struct EngineBuilder {
    registry: Option<Arc<SchemaRegistry>>,
    config: Option<EngineConfig>,
    config_file: Option<PathBuf>,
    locale: Option<Box<dyn LocaleFallback>>,
}

impl EngineBuilder {
    /// Create a builder with no registry and default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema registry the engine serves
    pub fn registry(mut self, registry: impl Into<Arc<SchemaRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Use an explicit configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from `path`, writing the default file if missing
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Replace the default [`ContextFallback`] policy
    pub fn locale_fallback(mut self, locale: impl LocaleFallback + 'static) -> Self {
        self.locale = Some(Box::new(locale));
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// `Config` when no registry was given or the config file cannot be
    /// written, read or parsed.
    pub fn build(self) -> TrellisResult<Engine> {
        let registry = self.registry.ok_or_else(|| {
            TrellisError::Config("engine requires a schema registry".to_string())
        })?;

        let config = match &self.config_file {
            Some(path) => {
                EngineConfig::write_default_if_missing(path)?;
                EngineConfig::from_file(path)?
            }
            None => self.config.unwrap_or_default(),
        };

        info!(
            target: "trellis::engine",
            entities = registry.entities().count(),
            system_language = %config.system_language,
            strict_reads = config.strict_reads,
            "engine ready"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                registry,
                store: RowStore::new(),
                system_language: config.system_language(),
                config,
                locale: self
                    .locale
                    .unwrap_or_else(|| Box::new(ContextFallback)),
            }),
        })
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("has_registry", &self.registry.is_some())
            .field("config", &self.config)
            .field("config_file", &self.config_file)
            .finish()
    }
}
