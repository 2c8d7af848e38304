//! Entity schema descriptors
//!
//! An [`EntitySchema`] declares everything the engine needs to know about an
//! entity type: its fields, the foreign keys among them (with their delete
//! behaviour) and the associations that detail reads and nested writes can
//! follow. Schemas are registered once in a
//! [`SchemaRegistry`](crate::registry::SchemaRegistry) and then passed to the
//! engine's operations as descriptors.
//!
//! The primary key is always the implicit `id` field.

use serde::{Deserialize, Serialize};

/// Name of the implicit primary key field
pub const ID_FIELD: &str = "id";

/// What happens to a dependent row when the row it references is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    /// Delete the dependent as well
    Cascade,
    /// Refuse the delete while a dependent exists
    Restrict,
    /// Clear the foreign key on the dependent
    SetNull,
}

/// Storage type of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Short string
    String,
    /// Long text
    Text,
    /// 64-bit integer
    Int,
    /// Floating point number (integers are accepted and widened)
    Float,
    /// Boolean
    Bool,
    /// Arbitrary JSON
    Json,
    /// RFC 3339 date-time stored as string
    DateTime,
    /// Reference to another entity's id
    ForeignKey {
        /// Referenced entity
        reference: String,
        /// Behaviour when the referenced row is deleted
        on_delete: OnDelete,
    },
}

impl FieldType {
    /// Whether sum/avg can be computed over this type
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Whether substring/prefix filters apply
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Text | FieldType::DateTime | FieldType::ForeignKey { .. }
        )
    }

    /// Whether values of this type have a meaningful order
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldType::Json | FieldType::Bool)
    }
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Storage type
    pub field_type: FieldType,
    /// Must be present (non-null) on insert
    pub required: bool,
    /// Value lives on the translation rows, resolved by language
    pub translated: bool,
}

impl FieldDefinition {
    /// Create an optional, untranslated field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            translated: false,
        }
    }

    /// Shorthand for a string field
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Shorthand for a text field
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// Shorthand for an integer field
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    /// Shorthand for a float field
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// Shorthand for a boolean field
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    /// Shorthand for a JSON field
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    /// Shorthand for a date-time field
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// Shorthand for a foreign key field
    pub fn foreign_key(
        name: impl Into<String>,
        reference: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        Self::new(
            name,
            FieldType::ForeignKey {
                reference: reference.into(),
                on_delete,
            },
        )
    }

    /// Builder: mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: mark as translated
    pub fn translated(mut self) -> Self {
        self.translated = true;
        self
    }

    /// Referenced entity if this is a foreign key
    pub fn reference(&self) -> Option<(&str, OnDelete)> {
        match &self.field_type {
            FieldType::ForeignKey {
                reference,
                on_delete,
            } => Some((reference.as_str(), *on_delete)),
            _ => None,
        }
    }
}

/// Shape of a declared association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    /// This entity holds `local_field` pointing at one `reference` row
    ManyToOne {
        /// Referenced entity
        reference: String,
        /// Foreign key field on this entity
        local_field: String,
    },
    /// `reference` rows hold `foreign_key` pointing at this entity
    OneToMany {
        /// Child entity
        reference: String,
        /// Foreign key field on the child
        foreign_key: String,
    },
    /// Translation rows, one per language
    Translations {
        /// Translation entity
        reference: String,
        /// Foreign key field on the translation entity
        foreign_key: String,
        /// Field on the translation entity holding the language code
        language_field: String,
    },
}

/// A named association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Name used in payloads, criteria paths and detail results
    pub name: String,
    /// Shape
    pub kind: AssociationKind,
}

impl Association {
    /// Many-to-one association through `local_field`
    pub fn many_to_one(
        name: impl Into<String>,
        reference: impl Into<String>,
        local_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::ManyToOne {
                reference: reference.into(),
                local_field: local_field.into(),
            },
        }
    }

    /// One-to-many association through the child's `foreign_key`
    pub fn one_to_many(
        name: impl Into<String>,
        reference: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::OneToMany {
                reference: reference.into(),
                foreign_key: foreign_key.into(),
            },
        }
    }

    /// Translation association
    pub fn translations(
        name: impl Into<String>,
        reference: impl Into<String>,
        foreign_key: impl Into<String>,
        language_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::Translations {
                reference: reference.into(),
                foreign_key: foreign_key.into(),
                language_field: language_field.into(),
            },
        }
    }

    /// Entity on the other side of the association
    pub fn reference(&self) -> &str {
        match &self.kind {
            AssociationKind::ManyToOne { reference, .. }
            | AssociationKind::OneToMany { reference, .. }
            | AssociationKind::Translations { reference, .. } => reference,
        }
    }

    /// Whether following the association yields many rows
    pub fn is_to_many(&self) -> bool {
        !matches!(self.kind, AssociationKind::ManyToOne { .. })
    }
}

/// Descriptor of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity name (`"product"`)
    pub entity: String,
    /// Declared fields (the `id` field is implicit)
    pub fields: Vec<FieldDefinition>,
    /// Declared associations
    pub associations: Vec<Association>,
}

impl EntitySchema {
    /// Empty schema for `entity`
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Builder: add a field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder: add an association
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Look up a declared field
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a declared association
    pub fn get_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// The translations association, if any
    pub fn translations(&self) -> Option<&Association> {
        self.associations
            .iter()
            .find(|a| matches!(a.kind, AssociationKind::Translations { .. }))
    }

    /// Fields stored on this entity's own rows
    pub fn storage_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.translated)
    }

    /// Fields stored on the translation rows
    pub fn translated_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.translated)
    }
}

/// Statically typed handle on an entity type
///
/// Implemented by one zero-sized type per entity so repositories can be
/// generic over their definition.
pub trait EntityDefinition: Send + Sync + 'static {
    /// Registered entity name
    const ENTITY_NAME: &'static str;

    /// Descriptor registered for this entity
    fn schema() -> EntitySchema;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> EntitySchema {
        EntitySchema::new("product")
            .field(FieldDefinition::string("name").required().translated())
            .field(FieldDefinition::int("stock"))
            .field(FieldDefinition::foreign_key(
                "manufacturer_id",
                "manufacturer",
                OnDelete::SetNull,
            ))
            .association(Association::many_to_one(
                "manufacturer",
                "manufacturer",
                "manufacturer_id",
            ))
            .association(Association::translations(
                "translations",
                "product_translation",
                "product_id",
                "language",
            ))
    }

    #[test]
    fn test_field_lookup() {
        let schema = product();
        assert!(schema.get_field("stock").is_some());
        assert!(schema.get_field("colour").is_none());
        assert_eq!(
            schema.get_field("manufacturer_id").unwrap().reference(),
            Some(("manufacturer", OnDelete::SetNull))
        );
    }

    #[test]
    fn test_translated_split() {
        let schema = product();
        let stored: Vec<_> = schema.storage_fields().map(|f| f.name.as_str()).collect();
        let translated: Vec<_> = schema.translated_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(stored, vec!["stock", "manufacturer_id"]);
        assert_eq!(translated, vec!["name"]);
        assert_eq!(schema.translations().unwrap().reference(), "product_translation");
    }

    #[test]
    fn test_association_shape() {
        let schema = product();
        let manufacturer = schema.get_association("manufacturer").unwrap();
        assert!(!manufacturer.is_to_many());
        assert_eq!(manufacturer.reference(), "manufacturer");
        assert!(schema.get_association("translations").unwrap().is_to_many());
    }

    #[test]
    fn test_field_type_capabilities() {
        assert!(FieldType::Int.is_numeric());
        assert!(!FieldType::String.is_numeric());
        assert!(FieldType::Text.is_textual());
        assert!(!FieldType::Json.is_ordered());
    }
}
