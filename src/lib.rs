//! Trellis - versioned entity engine
//!
//! Trellis turns declarative [`Criteria`] into ordered ids, hydrates basic
//! and detail entity collections, computes aggregations and keeps
//! copy-on-write version planes that can be merged back into live.
//!
//! # Quick Start
//!
//! ```ignore
//! use trellis::{Engine, EntityRepository, NoopDispatcher, ShopContext};
//! use trellis::testing::ProductDefinition;
//!
//! let engine = Engine::builder().registry(trellis::testing::catalog()).build()?;
//! let products = EntityRepository::<ProductDefinition>::new(engine, Arc::new(NoopDispatcher))?;
//!
//! products.create(&[json!({ "name": "Chair" })], &ShopContext::default())?;
//! ```
//!
//! # Architecture
//!
//! - `trellis-core`: ids, values, contexts, criteria, schemas, errors
//! - `trellis-storage`: in-memory transactional row store with version planes
//! - `trellis-engine`: searcher, reader, aggregator, version manager
//! - `trellis-api`: typed repositories and lifecycle events
//!
//! Storage internals are not re-exported.

pub use trellis_api::*;
pub use trellis_core::*;
pub use trellis_engine::{
    ContextFallback, Engine, EngineBuilder, EngineConfig, EntityAggregator, EntityReader,
    EntitySearcher, LocaleFallback, MergeInfo, NoFallback, ReadOptions, VersionManager,
    CONFIG_FILE_NAME,
};
