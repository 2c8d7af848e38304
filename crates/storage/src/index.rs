//! Secondary index over version planes
//!
//! The primary map orders rows by tenant and entity first, so the rows of
//! one version plane are scattered across entity ranges. `PlaneIndex` maps
//! each non-live version id to the set of keys tagged with it, which turns
//! merging a plane from O(total rows) into O(plane size).

use crate::row::RowKey;
use rustc_hash::{FxHashMap, FxHashSet};
use trellis_core::VersionId;

/// Secondary index: VersionId → Keys
///
/// Live rows are not indexed.
#[derive(Debug, Default)]
pub struct PlaneIndex {
    index: FxHashMap<VersionId, FxHashSet<RowKey>>,
}

impl PlaneIndex {
    /// Create a new empty PlaneIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Add key to its plane's set
    pub fn insert(&mut self, key: RowKey) {
        if key.version.is_live() {
            return;
        }
        self.index.entry(key.version).or_default().insert(key);
    }

    /// Remove key from its plane's set
    ///
    /// Drops the plane entry once its set is empty.
    pub fn remove(&mut self, key: &RowKey) {
        if let Some(keys) = self.index.get_mut(&key.version) {
            keys.remove(key);
            if keys.is_empty() {
                self.index.remove(&key.version);
            }
        }
    }

    /// All keys tagged with `version`
    pub fn get(&self, version: &VersionId) -> Option<&FxHashSet<RowKey>> {
        self.index.get(version)
    }

    /// Whether any row is tagged with `version`
    pub fn contains(&self, version: &VersionId) -> bool {
        self.index.contains_key(version)
    }

    /// Number of planes with at least one row
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
