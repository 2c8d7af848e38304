//! Entity engine for Trellis
//!
//! This crate implements the generic read/write/versioning services every
//! entity repository delegates to:
//! - Engine: shared registry, row store, configuration and locale policy
//! - EntitySearcher: criteria to ordered ids plus total
//! - EntityReader: ids to basic or detail collections
//! - EntityAggregator: count, sum, avg, min, max, value lists and buckets
//! - VersionManager: insert/update/upsert/delete, create_version, merge
//!
//! All services resolve rows through the plane view of the context's
//! version: live rows overlaid by the version's rows and tombstones.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod locale;
pub mod reader;
pub mod searcher;
pub mod version_manager;

mod merge;
mod path;
mod payload;
mod query;
mod scope;
mod writer;

pub use aggregator::EntityAggregator;
pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use engine::{Engine, EngineBuilder};
pub use locale::{ContextFallback, LocaleFallback, NoFallback};
pub use merge::MergeInfo;
pub use reader::{EntityReader, ReadOptions};
pub use searcher::EntitySearcher;
pub use version_manager::VersionManager;
