//! Error types for the Trellis engine
//!
//! Every operation of the engine returns [`TrellisResult`]. The variants form
//! the complete error taxonomy of the read and write paths:
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `InvalidCriteria` | searcher, aggregator, reader (unknown field or association path) |
//! | `UnsupportedAggregation` | aggregator (aggregation incompatible with the field type) |
//! | `EntityNotFound` | reader in strict mode, writes referencing absent rows, `create_version` |
//! | `ForeignKeyConstraint` | delete blocked by a `Restrict` dependent |
//! | `VersionNotFound` | `merge` of an unknown version |
//! | `Validation` | write payloads failing schema constraints |
//! | `DataStore` | storage / transaction failures |
//!
//! `Schema` and `Config` only occur while the engine is being assembled.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{EntityId, VersionId};
use thiserror::Error;

/// Result type alias for engine operations
pub type TrellisResult<T> = std::result::Result<T, TrellisError>;

/// Discriminant of a [`TrellisError`], convenient for matching in callers
/// that render user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed query
    InvalidCriteria,
    /// Aggregation incompatible with field type
    UnsupportedAggregation,
    /// Referenced id absent where existence is required
    EntityNotFound,
    /// Restrict delete behaviour violated
    ForeignKeyConstraint,
    /// Unknown version id
    VersionNotFound,
    /// Write payload failed schema constraints
    Validation,
    /// Storage or transaction failure
    DataStore,
    /// Invalid schema catalog
    Schema,
    /// Unreadable configuration
    Config,
}

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum TrellisError {
    /// A criteria references an unknown field or association path, or
    /// uses an operator the field cannot support
    #[error("invalid criteria for '{entity}' at '{path}': {reason}")]
    InvalidCriteria {
        /// Entity the criteria was resolved against
        entity: String,
        /// Offending field or association path
        path: String,
        /// Human-readable reason
        reason: String,
    },

    /// An aggregation cannot be computed for the field's type
    #[error("unsupported aggregation '{aggregation}' on '{entity}.{field}': {reason}")]
    UnsupportedAggregation {
        /// Entity the aggregation was resolved against
        entity: String,
        /// Name of the requested aggregation
        aggregation: String,
        /// Aggregated field path
        field: String,
        /// Human-readable reason
        reason: String,
    },

    /// A referenced row does not exist
    #[error("entity '{entity}' with id {id} not found")]
    EntityNotFound {
        /// Entity name
        entity: String,
        /// Missing id
        id: EntityId,
    },

    /// A `Restrict` dependent still references the row being deleted
    #[error("cannot delete '{entity}' {id}: still referenced by '{referenced_by}' {referencing_id}")]
    ForeignKeyConstraint {
        /// Entity being deleted
        entity: String,
        /// Id being deleted
        id: EntityId,
        /// Entity holding the restricting foreign key
        referenced_by: String,
        /// Row holding the restricting foreign key
        referencing_id: EntityId,
    },

    /// No version plane exists for the id
    #[error("version {version_id} not found")]
    VersionNotFound {
        /// The unknown version id
        version_id: VersionId,
    },

    /// A write payload failed schema validation
    #[error("validation failed for '{entity}.{field}': {message}")]
    Validation {
        /// Entity being written
        entity: String,
        /// Offending field (or `*` for payload-level problems)
        field: String,
        /// Human-readable message
        message: String,
    },

    /// The data store rejected or failed an operation
    #[error("data store error: {message}")]
    DataStore {
        /// Human-readable message
        message: String,
    },

    /// The schema catalog is inconsistent
    #[error("schema error: {0}")]
    Schema(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrellisError {
    /// Create an `InvalidCriteria` error
    pub fn invalid_criteria(
        entity: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TrellisError::InvalidCriteria {
            entity: entity.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an `UnsupportedAggregation` error
    pub fn unsupported_aggregation(
        entity: impl Into<String>,
        aggregation: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TrellisError::UnsupportedAggregation {
            entity: entity.into(),
            aggregation: aggregation.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an `EntityNotFound` error
    pub fn entity_not_found(entity: impl Into<String>, id: EntityId) -> Self {
        TrellisError::EntityNotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Create a `Validation` error
    pub fn validation(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TrellisError::Validation {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a `DataStore` error
    pub fn data_store(message: impl Into<String>) -> Self {
        TrellisError::DataStore {
            message: message.into(),
        }
    }

    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrellisError::InvalidCriteria { .. } => ErrorKind::InvalidCriteria,
            TrellisError::UnsupportedAggregation { .. } => ErrorKind::UnsupportedAggregation,
            TrellisError::EntityNotFound { .. } => ErrorKind::EntityNotFound,
            TrellisError::ForeignKeyConstraint { .. } => ErrorKind::ForeignKeyConstraint,
            TrellisError::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            TrellisError::Validation { .. } => ErrorKind::Validation,
            TrellisError::DataStore { .. } => ErrorKind::DataStore,
            TrellisError::Schema(_) => ErrorKind::Schema,
            TrellisError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<toml::de::Error> for TrellisError {
    fn from(e: toml::de::Error) -> Self {
        TrellisError::Config(e.to_string())
    }
}

impl From<std::io::Error> for TrellisError {
    fn from(e: std::io::Error) -> Self {
        TrellisError::Config(e.to_string())
    }
}
