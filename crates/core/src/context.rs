//! Request contexts
//!
//! A [`ShopContext`] describes who is asking (tenant), in which language and
//! against which plane. It is passed by reference into every read operation
//! and never mutated. Writes take a [`WriteContext`], derived from the shop
//! context by the pure conversion [`WriteContext::from_shop_context`].

use crate::types::{LanguageId, TenantId, VersionId};
use serde::{Deserialize, Serialize};

/// Immutable read context of one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopContext {
    /// Tenant scope of every row read or written
    pub tenant_id: TenantId,
    /// Requested language
    pub language_id: LanguageId,
    /// Language consulted when a translation is missing in `language_id`
    pub fallback_language_id: Option<LanguageId>,
    /// Plane the call operates on
    pub version_id: VersionId,
}

impl ShopContext {
    /// Context for the default tenant on the live plane
    pub fn new(language_id: impl Into<LanguageId>) -> Self {
        Self {
            tenant_id: TenantId::DEFAULT,
            language_id: language_id.into(),
            fallback_language_id: None,
            version_id: VersionId::LIVE,
        }
    }

    /// Copy of this context scoped to another tenant
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Copy of this context with a fallback language
    pub fn with_fallback_language(mut self, language_id: impl Into<LanguageId>) -> Self {
        self.fallback_language_id = Some(language_id.into());
        self
    }

    /// Copy of this context operating on another plane
    pub fn with_version(mut self, version_id: VersionId) -> Self {
        self.version_id = version_id;
        self
    }
}

impl Default for ShopContext {
    fn default() -> Self {
        Self::new("en-GB")
    }
}

/// Immutable write context of one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteContext {
    /// Tenant the written rows belong to
    pub tenant_id: TenantId,
    /// Language translated fields are written in
    pub language_id: LanguageId,
    /// Plane the rows are written to
    pub version_id: VersionId,
}

impl WriteContext {
    /// Derive a write context from a shop context
    ///
    /// Pure and deterministic: the same shop context always yields the same
    /// write context.
    pub fn from_shop_context(context: &ShopContext) -> Self {
        Self {
            tenant_id: context.tenant_id,
            language_id: context.language_id.clone(),
            version_id: context.version_id,
        }
    }

    /// Copy of this context operating on another plane
    pub fn with_version(&self, version_id: VersionId) -> Self {
        Self {
            version_id,
            ..self.clone()
        }
    }

    /// Shop context reading the plane this context writes to
    pub fn to_shop_context(&self) -> ShopContext {
        ShopContext {
            tenant_id: self.tenant_id,
            language_id: self.language_id.clone(),
            fallback_language_id: None,
            version_id: self.version_id,
        }
    }
}
