//! Plane-scoped row lookups for one read call
//!
//! A [`ReadScope`] pins a row source, a tenant, a plane and a language
//! chain for the duration of a search, read or aggregation. Child lookups
//! (one-to-many and translation rows) are grouped by parent on first use
//! and reused for the rest of the call.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use trellis_core::{
    AssociationKind, BasicEntity, EntityId, EntitySchema, LanguageId, TenantId,
    Value, VersionId,
};
use trellis_storage::{RowSource, VisibleRow};

type ChildGroups<'a> = Rc<FxHashMap<EntityId, Vec<VisibleRow<'a>>>>;

/// Row lookups pinned to one tenant, plane and language chain
pub(crate) struct ReadScope<'a> {
    source: &'a dyn RowSource,
    tenant: TenantId,
    plane: VersionId,
    languages: Vec<LanguageId>,
    groups: RefCell<FxHashMap<(String, String), ChildGroups<'a>>>,
}

impl<'a> ReadScope<'a> {
    pub(crate) fn new(
        source: &'a dyn RowSource,
        tenant: TenantId,
        plane: VersionId,
        languages: Vec<LanguageId>,
    ) -> Self {
        Self {
            source,
            tenant,
            plane,
            languages,
            groups: RefCell::new(FxHashMap::default()),
        }
    }

    /// Every visible row of `entity`, ordered by id
    pub(crate) fn rows(&self, entity: &str) -> Vec<VisibleRow<'a>> {
        self.source.visible_rows(self.tenant, entity, self.plane)
    }

    /// Visible row of `entity` with `id`
    pub(crate) fn row(&self, entity: &str, id: EntityId) -> Option<VisibleRow<'a>> {
        self.source.visible(self.tenant, entity, id, self.plane)
    }

    /// Visible rows of `entity` whose `foreign_key` holds `parent`, by id
    pub(crate) fn children(
        &self,
        entity: &str,
        foreign_key: &str,
        parent: EntityId,
    ) -> Vec<VisibleRow<'a>> {
        let groups = self.groups_for(entity, foreign_key);
        groups.get(&parent).cloned().unwrap_or_default()
    }

    fn groups_for(&self, entity: &str, foreign_key: &str) -> ChildGroups<'a> {
        let cache_key = (entity.to_string(), foreign_key.to_string());
        if let Some(groups) = self.groups.borrow().get(&cache_key) {
            return Rc::clone(groups);
        }

        let mut grouped: FxHashMap<EntityId, Vec<VisibleRow<'a>>> = FxHashMap::default();
        for row in self.rows(entity) {
            if let Some(parent) = row.row.get(foreign_key).as_str().and_then(EntityId::parse) {
                grouped.entry(parent).or_default().push(row);
            }
        }
        let grouped = Rc::new(grouped);
        self.groups
            .borrow_mut()
            .insert(cache_key, Rc::clone(&grouped));
        grouped
    }

    /// Translation rows of an entity, ordered by language
    pub(crate) fn translations(&self, schema: &EntitySchema, id: EntityId) -> Vec<VisibleRow<'a>> {
        let Some(association) = schema.translations() else {
            return Vec::new();
        };
        let AssociationKind::Translations {
            reference,
            foreign_key,
            language_field,
        } = &association.kind
        else {
            return Vec::new();
        };
        let mut rows = self.children(reference, foreign_key, id);
        rows.sort_by(|a, b| {
            a.row
                .get(language_field)
                .total_cmp(b.row.get(language_field))
        });
        rows
    }

    /// Value of a translated field along the language chain
    ///
    /// Returns `Null` when no language of the chain has a value.
    pub(crate) fn translated(
        &self,
        schema: &EntitySchema,
        translations: &[VisibleRow<'a>],
        field: &str,
    ) -> Value {
        let Some(language_field) = schema.translations().and_then(|a| match &a.kind {
            AssociationKind::Translations { language_field, .. } => Some(language_field.as_str()),
            _ => None,
        }) else {
            return Value::Null;
        };

        for language in &self.languages {
            let found = translations.iter().find(|t| {
                t.row.get(language_field).as_str() == Some(language.as_str())
            });
            if let Some(translation) = found {
                let value = translation.row.get(field);
                if !value.is_null() {
                    return value.clone();
                }
            }
        }
        Value::Null
    }

    /// Basic hydration: declared fields plus resolved translated fields
    pub(crate) fn hydrate(&self, schema: &EntitySchema, row: &VisibleRow<'a>) -> BasicEntity {
        let mut fields = BTreeMap::new();
        for field in schema.storage_fields() {
            fields.insert(field.name.clone(), row.row.get(&field.name).clone());
        }
        if schema.translated_fields().next().is_some() {
            let translations = self.translations(schema, row.id);
            for field in schema.translated_fields() {
                let value = self.translated(schema, &translations, &field.name);
                fields.insert(field.name.clone(), value);
            }
        }
        BasicEntity {
            id: row.id,
            version_id: row.version_id,
            fields,
            created_at: row.row.created_at,
            updated_at: row.row.updated_at,
        }
    }
}

/// Primary key as a field value
pub(crate) fn id_value(id: EntityId) -> Value {
    Value::String(id.to_string())
}

/// Foreign key held in `field` of a row, if set and well-formed
pub(crate) fn foreign_key(row: &VisibleRow<'_>, field: &str) -> Option<EntityId> {
    row.row.get(field).as_str().and_then(EntityId::parse)
}
