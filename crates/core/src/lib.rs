//! Core types for Trellis
//!
//! This crate defines the foundational types shared by every layer:
//! - EntityId / VersionId / TenantId / LanguageId: identifiers
//! - Value: canonical field value
//! - ShopContext / WriteContext: immutable request contexts
//! - Criteria: declarative query description
//! - EntitySchema / SchemaRegistry: static entity descriptors
//! - Result types: IdSearchResult, EntityCollection, AggregatorResult, WrittenEvent
//! - Error: the engine's error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod criteria;
pub mod error;
pub mod registry;
pub mod result;
pub mod schema;
pub mod testing;
pub mod types;
pub mod value;

pub use context::{ShopContext, WriteContext};
pub use criteria::{
    Aggregation, AggregationKind, Criteria, Filter, FilterOperator, MultiOperator, Range, Sort,
    SortDirection,
};
pub use error::{ErrorKind, TrellisError, TrellisResult};
pub use registry::{Dependent, SchemaRegistry, SchemaRegistryBuilder};
pub use result::{
    AggregationValue, AggregatorResult, AssociationValue, BasicCollection, BasicEntity, Bucket,
    DetailCollection, DetailEntity, EntityCollection, IdSearchResult, Identified, SearchResult,
    WriteOperation, WrittenEvent,
};
pub use schema::{
    Association, AssociationKind, EntityDefinition, EntitySchema, FieldDefinition, FieldType,
    OnDelete, ID_FIELD,
};
pub use types::{EntityId, LanguageId, TenantId, VersionId};
pub use value::Value;
