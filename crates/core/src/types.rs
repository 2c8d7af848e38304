//! Identifier types for the Trellis engine
//!
//! This module defines the foundational identifiers:
//! - EntityId: primary key of every entity row
//! - VersionId: identifies a plane (the live plane or a version branch)
//! - TenantId: top-level isolation scope
//! - LanguageId: locale code used for translation rows

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Primary key of an entity row
///
/// A wrapper around a UUID. New ids are random (v4); translation rows use
/// [`EntityId::derived`] so that a `(parent, language)` pair always maps to
/// the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new random EntityId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an EntityId from a raw UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derive a stable id from a parent id and a discriminator
    ///
    /// Uses UUID v5 with the parent as namespace, so the same inputs always
    /// produce the same id.
    pub fn derived(parent: EntityId, discriminator: &str) -> Self {
        Self(Uuid::new_v5(&parent.0, discriminator.as_bytes()))
    }

    /// Parse an EntityId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a plane of the entity graph
///
/// Every stored row carries exactly one version id. [`VersionId::LIVE`] is
/// the well-known id of the live (default) plane; any other id names a
/// version branch created with `create_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(Uuid);

impl VersionId {
    /// The live plane
    pub const LIVE: VersionId = VersionId(Uuid::from_u128(0x20080911_ffff_4fff_afff_ffff19830531));

    /// Create a new random VersionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a VersionId from a raw UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a VersionId from a string representation
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Whether this is the live plane
    pub fn is_live(&self) -> bool {
        *self == Self::LIVE
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::LIVE
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant scope of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// The tenant used when a caller does not care about multi-tenancy
    pub const DEFAULT: TenantId = TenantId(Uuid::from_u128(0xffffffff_ffff_ffff_ffff_ffffffffffff));

    /// Create a new random TenantId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a TenantId from a raw UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locale code identifying a language (e.g. `"en-GB"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguageId(String);

impl LanguageId {
    /// Create a LanguageId from a locale code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the locale code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LanguageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
