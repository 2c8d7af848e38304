//! Storage layer for Trellis
//!
//! This crate implements the in-memory row store behind the engine:
//! - RowStore: BTreeMap-based storage with RwLock
//! - Plane-tagged rows keyed by `(tenant, entity, version, id)`, with tombstones
//! - Version records for named version planes
//! - Secondary plane index for version-wide queries
//! - StoreView (read guard) and Transaction (buffered write set)
//! - RowSource: plane resolution shared by views and transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod row;
pub mod source;
pub mod store;
pub mod transaction;

pub use index::PlaneIndex;
pub use row::{RowKey, StoredRow, VersionRecord, VisibleRow};
pub use source::RowSource;
pub use store::{BatchStats, CommitInfo, RowStore, StoreState, StoreView};
pub use transaction::Transaction;
