//! Static registry of entity schemas
//!
//! The registry is assembled once at startup with [`SchemaRegistry::builder`]
//! and is immutable afterwards. `build()` validates the whole catalog so the
//! engine can rely on every reference resolving:
//!
//! - foreign keys point at registered entities
//! - `SetNull` is only declared on optional fields
//! - association foreign keys exist on the referenced schema
//! - translated fields are declared on the translation schema
//!
//! Besides lookups by name the registry answers the reverse question the
//! delete path needs: which foreign keys reference a given entity.

use crate::error::{TrellisError, TrellisResult};
use crate::schema::{
    Association, AssociationKind, EntityDefinition, EntitySchema, FieldType, OnDelete, ID_FIELD,
};
use std::collections::{BTreeMap, BTreeSet};

/// A foreign key referencing some entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    /// Entity holding the foreign key
    pub entity: String,
    /// Foreign key field
    pub field: String,
    /// Declared delete behaviour
    pub on_delete: OnDelete,
}

/// Immutable catalog of entity schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
    dependents: BTreeMap<String, Vec<Dependent>>,
}

impl SchemaRegistry {
    /// Start assembling a registry
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up a schema by entity name
    pub fn get(&self, entity: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity)
    }

    /// Look up a schema, failing with a `Schema` error for unknown names
    pub fn schema(&self, entity: &str) -> TrellisResult<&EntitySchema> {
        self.get(entity)
            .ok_or_else(|| TrellisError::Schema(format!("entity '{}' is not registered", entity)))
    }

    /// Schema registered for a typed definition
    pub fn definition<D: EntityDefinition>(&self) -> TrellisResult<&EntitySchema> {
        self.schema(D::ENTITY_NAME)
    }

    /// Whether `entity` is registered
    pub fn contains(&self, entity: &str) -> bool {
        self.schemas.contains_key(entity)
    }

    /// Registered entity names in ascending order
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Every foreign key referencing `entity`, ordered by (entity, field)
    pub fn dependents_of(&self, entity: &str) -> &[Dependent] {
        self.dependents
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether rows reached through `association` belong to the parent
    ///
    /// Owned rows are copied into a version plane together with their
    /// parent. Translations are always owned; a one-to-many association is
    /// owned when the child's foreign key cascades.
    pub fn is_owned(&self, association: &Association) -> bool {
        match &association.kind {
            AssociationKind::ManyToOne { .. } => false,
            AssociationKind::Translations { .. } => true,
            AssociationKind::OneToMany {
                reference,
                foreign_key,
            } => self
                .get(reference)
                .and_then(|child| child.get_field(foreign_key))
                .and_then(|field| field.reference())
                .map(|(_, on_delete)| on_delete == OnDelete::Cascade)
                .unwrap_or(false),
        }
    }

    /// Owned associations of `schema`, in declaration order
    pub fn owned_associations<'a>(
        &'a self,
        schema: &'a EntitySchema,
    ) -> impl Iterator<Item = &'a Association> + 'a {
        schema.associations.iter().filter(|a| self.is_owned(a))
    }
}

/// Builder for [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<EntitySchema>,
}

impl SchemaRegistryBuilder {
    /// Register a schema descriptor
    pub fn register(mut self, schema: EntitySchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register the schema of a typed definition
    pub fn register_definition<D: EntityDefinition>(self) -> Self {
        self.register(D::schema())
    }

    /// Validate the catalog and freeze it
    pub fn build(self) -> TrellisResult<SchemaRegistry> {
        let mut schemas = BTreeMap::new();
        for schema in self.schemas {
            if schemas.contains_key(&schema.entity) {
                return Err(TrellisError::Schema(format!(
                    "entity '{}' registered twice",
                    schema.entity
                )));
            }
            schemas.insert(schema.entity.clone(), schema);
        }

        for schema in schemas.values() {
            validate_schema(schema, &schemas)?;
        }

        let mut dependents: BTreeMap<String, Vec<Dependent>> = BTreeMap::new();
        for schema in schemas.values() {
            for field in &schema.fields {
                if let Some((reference, on_delete)) = field.reference() {
                    dependents
                        .entry(reference.to_string())
                        .or_default()
                        .push(Dependent {
                            entity: schema.entity.clone(),
                            field: field.name.clone(),
                            on_delete,
                        });
                }
            }
        }

        Ok(SchemaRegistry {
            schemas,
            dependents,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

fn schema_error(entity: &str, message: impl std::fmt::Display) -> TrellisError {
    TrellisError::Schema(format!("{}: {}", entity, message))
}

fn validate_schema(
    schema: &EntitySchema,
    catalog: &BTreeMap<String, EntitySchema>,
) -> TrellisResult<()> {
    let entity = schema.entity.as_str();
    let mut names = BTreeSet::new();

    for field in &schema.fields {
        if field.name == ID_FIELD {
            return Err(schema_error(entity, "'id' is implicit and cannot be declared"));
        }
        if !names.insert(field.name.as_str()) {
            return Err(schema_error(entity, format!("field '{}' declared twice", field.name)));
        }
        if let FieldType::ForeignKey {
            reference,
            on_delete,
        } = &field.field_type
        {
            if !catalog.contains_key(reference) {
                return Err(schema_error(
                    entity,
                    format!("field '{}' references unknown entity '{}'", field.name, reference),
                ));
            }
            if *on_delete == OnDelete::SetNull && field.required {
                return Err(schema_error(
                    entity,
                    format!("required field '{}' cannot use SetNull", field.name),
                ));
            }
            if field.translated {
                return Err(schema_error(
                    entity,
                    format!("foreign key '{}' cannot be translated", field.name),
                ));
            }
        }
    }

    for association in &schema.associations {
        if !names.insert(association.name.as_str()) {
            return Err(schema_error(
                entity,
                format!("association '{}' collides with another name", association.name),
            ));
        }
        let target = catalog.get(association.reference()).ok_or_else(|| {
            schema_error(
                entity,
                format!(
                    "association '{}' references unknown entity '{}'",
                    association.name,
                    association.reference()
                ),
            )
        })?;

        match &association.kind {
            AssociationKind::ManyToOne { local_field, .. } => {
                expect_foreign_key(schema, local_field, &target.entity).map_err(|m| {
                    schema_error(entity, format!("association '{}': {}", association.name, m))
                })?;
            }
            AssociationKind::OneToMany { foreign_key, .. } => {
                expect_foreign_key(target, foreign_key, entity).map_err(|m| {
                    schema_error(entity, format!("association '{}': {}", association.name, m))
                })?;
            }
            AssociationKind::Translations {
                foreign_key,
                language_field,
                ..
            } => {
                expect_foreign_key(target, foreign_key, entity).map_err(|m| {
                    schema_error(entity, format!("association '{}': {}", association.name, m))
                })?;
                match target.get_field(language_field) {
                    Some(f) if f.field_type == FieldType::String && f.required => {}
                    _ => {
                        return Err(schema_error(
                            entity,
                            format!(
                                "translation entity '{}' needs a required string field '{}'",
                                target.entity, language_field
                            ),
                        ))
                    }
                }
                for translated in schema.translated_fields() {
                    let declared = target.get_field(&translated.name);
                    if declared.map(|f| &f.field_type) != Some(&translated.field_type) {
                        return Err(schema_error(
                            entity,
                            format!(
                                "translated field '{}' is not declared on '{}' with the same type",
                                translated.name, target.entity
                            ),
                        ));
                    }
                }
            }
        }
    }

    let translation_associations = schema
        .associations
        .iter()
        .filter(|a| matches!(a.kind, AssociationKind::Translations { .. }))
        .count();
    if translation_associations > 1 {
        return Err(schema_error(entity, "more than one translations association"));
    }
    if translation_associations == 0 && schema.translated_fields().next().is_some() {
        return Err(schema_error(
            entity,
            "translated fields require a translations association",
        ));
    }

    Ok(())
}

fn expect_foreign_key(holder: &EntitySchema, field: &str, target: &str) -> Result<(), String> {
    match holder.get_field(field).and_then(|f| f.reference()) {
        Some((reference, _)) if reference == target => Ok(()),
        Some((reference, _)) => Err(format!(
            "'{}.{}' references '{}', expected '{}'",
            holder.entity, field, reference, target
        )),
        None => Err(format!(
            "'{}.{}' is not a foreign key",
            holder.entity, field
        )),
    }
}
