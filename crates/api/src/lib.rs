//! Public API layer for Trellis
//!
//! This crate provides the per-entity surface applications program against:
//! - **EntityRepository**: typed facade over the engine services
//! - **RepositoryEvent**: lifecycle event forwarded after every call
//! - **EventDispatcher**: receiver of those events
//!
//! ## Architectural Invariant
//!
//! Every repository call forwards to exactly one engine call pattern and
//! dispatches at most one event, after the engine returned successfully.
//! The engine itself never dispatches.
//!
//! ## Quick Start
//!
//! ```ignore
//! use trellis_api::{EntityRepository, RecordingDispatcher};
//! use trellis_core::testing::ProductDefinition;
//!
//! let products = EntityRepository::<ProductDefinition>::new(engine, Arc::new(RecordingDispatcher::new()))?;
//! let ctx = ShopContext::default();
//! let written = products.create(&[json!({ "name": "Chair" })], &ctx)?;
//! let result = products.search(&Criteria::new(), &ctx)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod events;
pub mod repository;

pub use dispatcher::{EventDispatcher, NoopDispatcher, RecordingDispatcher, TracingDispatcher};
pub use events::{GenericWrittenEvent, RepositoryEvent, GENERIC_WRITTEN_EVENT};
pub use repository::EntityRepository;
