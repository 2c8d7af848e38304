//! Field path resolution
//!
//! Criteria reference fields by dotted paths: `"stock"`, `"name"` (a
//! translated field), `"manufacturer.name"` (through a many-to-one),
//! `"prices.amount"` (through a one-to-many) or `"translations.name"`.
//! A path is resolved against the schema registry once per call into a
//! [`FieldPath`] and then evaluated per row.
//!
//! Evaluation yields every value the path reaches: one value for own
//! fields and many-to-one hops, any number through to-many hops.

use smallvec::SmallVec;
use trellis_core::{
    Association, AssociationKind, EntitySchema, FieldDefinition, FieldType, SchemaRegistry,
    TrellisError, TrellisResult, Value, ID_FIELD,
};
use trellis_storage::VisibleRow;

use crate::scope::{foreign_key, id_value, ReadScope};

/// Final segment of a path
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'r> {
    /// The implicit primary key
    Id,
    /// A declared field
    Field(&'r FieldDefinition),
}

impl Target<'_> {
    fn field_type(&self) -> Option<&FieldType> {
        match self {
            Target::Id => None,
            Target::Field(f) => Some(&f.field_type),
        }
    }

    /// Substring and prefix filters apply
    pub(crate) fn is_textual(&self) -> bool {
        self.field_type().map(FieldType::is_textual).unwrap_or(true)
    }

    /// Range filters and sorting apply
    pub(crate) fn is_ordered(&self) -> bool {
        self.field_type().map(FieldType::is_ordered).unwrap_or(true)
    }

    /// Sum and average apply
    pub(crate) fn is_numeric(&self) -> bool {
        self.field_type().map(FieldType::is_numeric).unwrap_or(false)
    }

    /// Arbitrary JSON
    pub(crate) fn is_json(&self) -> bool {
        matches!(self.field_type(), Some(FieldType::Json))
    }

    /// Integer-typed
    pub(crate) fn is_int(&self) -> bool {
        matches!(self.field_type(), Some(FieldType::Int))
    }

    /// Whether `value` is a legal comparison operand for this target
    pub(crate) fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self.field_type() {
            None => value.as_str().is_some(),
            Some(FieldType::String)
            | Some(FieldType::Text)
            | Some(FieldType::DateTime)
            | Some(FieldType::ForeignKey { .. }) => value.as_str().is_some(),
            Some(FieldType::Int) | Some(FieldType::Float) => value.is_number(),
            Some(FieldType::Bool) => value.as_bool().is_some(),
            Some(FieldType::Json) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self.field_type() {
            None => "id",
            Some(FieldType::String) => "string",
            Some(FieldType::Text) => "text",
            Some(FieldType::Int) => "int",
            Some(FieldType::Float) => "float",
            Some(FieldType::Bool) => "bool",
            Some(FieldType::Json) => "json",
            Some(FieldType::DateTime) => "datetime",
            Some(FieldType::ForeignKey { .. }) => "foreign key",
        }
    }
}

/// One association traversal
#[derive(Debug, Clone, Copy)]
pub(crate) struct Hop<'r> {
    pub(crate) association: &'r Association,
    pub(crate) target: &'r EntitySchema,
}

/// A resolved field path
#[derive(Debug, Clone)]
pub(crate) struct FieldPath<'r> {
    pub(crate) raw: String,
    pub(crate) hops: SmallVec<[Hop<'r>; 2]>,
    pub(crate) schema: &'r EntitySchema,
    pub(crate) target: Target<'r>,
}

impl<'r> FieldPath<'r> {
    /// Resolve `path` starting at `root`
    pub(crate) fn resolve(
        registry: &'r SchemaRegistry,
        root: &'r EntitySchema,
        path: &str,
    ) -> TrellisResult<Self> {
        let invalid = |reason: String| TrellisError::invalid_criteria(&root.entity, path, reason);

        let segments: SmallVec<[&str; 4]> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment".to_string()));
        }
        let (field_name, associations) = match segments.split_last() {
            Some(split) => split,
            None => return Err(invalid("empty path".to_string())),
        };

        let hops = resolve_hops(registry, root, associations).map_err(invalid)?;
        let schema = hops.last().map(|h| h.target).unwrap_or(root);

        let target = if *field_name == ID_FIELD {
            Target::Id
        } else if let Some(field) = schema.get_field(field_name) {
            Target::Field(field)
        } else if schema.get_association(field_name).is_some() {
            return Err(invalid(format!(
                "'{}' is an association, not a field",
                field_name
            )));
        } else {
            return Err(invalid(format!(
                "unknown field '{}' on '{}'",
                field_name, schema.entity
            )));
        };

        Ok(Self {
            raw: path.to_string(),
            hops,
            schema,
            target,
        })
    }

    /// Whether the path can reach more than one value
    pub(crate) fn is_to_many(&self) -> bool {
        self.hops.iter().any(|h| h.association.is_to_many())
    }

    /// Field type name of the target, for error messages
    pub(crate) fn type_name(&self) -> &'static str {
        self.target.type_name()
    }

    /// Every value the path reaches from `row`
    pub(crate) fn values<'a>(&self, scope: &ReadScope<'a>, row: &VisibleRow<'a>) -> Vec<Value> {
        let mut current: SmallVec<[VisibleRow<'a>; 4]> = SmallVec::new();
        current.push(*row);

        for hop in &self.hops {
            let mut next: SmallVec<[VisibleRow<'a>; 4]> = SmallVec::new();
            for row in &current {
                match &hop.association.kind {
                    AssociationKind::ManyToOne {
                        reference,
                        local_field,
                    } => {
                        if let Some(target) = foreign_key(row, local_field)
                            .and_then(|id| scope.row(reference, id))
                        {
                            next.push(target);
                        }
                    }
                    AssociationKind::OneToMany {
                        reference,
                        foreign_key,
                    }
                    | AssociationKind::Translations {
                        reference,
                        foreign_key,
                        ..
                    } => next.extend(scope.children(reference, foreign_key, row.id)),
                }
            }
            current = next;
        }

        current
            .iter()
            .map(|row| self.target_value(scope, row))
            .collect()
    }

    /// The single value a to-one path reaches (`Null` when it reaches none)
    pub(crate) fn single_value<'a>(&self, scope: &ReadScope<'a>, row: &VisibleRow<'a>) -> Value {
        self.values(scope, row).into_iter().next().unwrap_or(Value::Null)
    }

    fn target_value<'a>(&self, scope: &ReadScope<'a>, row: &VisibleRow<'a>) -> Value {
        match self.target {
            Target::Id => id_value(row.id),
            Target::Field(field) if field.translated => {
                let translations = scope.translations(self.schema, row.id);
                scope.translated(self.schema, &translations, &field.name)
            }
            Target::Field(field) => row.row.get(&field.name).clone(),
        }
    }
}

/// Resolve a chain of association names starting at `root`
pub(crate) fn resolve_hops<'r>(
    registry: &'r SchemaRegistry,
    root: &'r EntitySchema,
    names: &[&str],
) -> Result<SmallVec<[Hop<'r>; 2]>, String> {
    let mut hops = SmallVec::new();
    let mut schema = root;
    for name in names {
        let association = schema
            .get_association(name)
            .ok_or_else(|| format!("unknown association '{}' on '{}'", name, schema.entity))?;
        let target = registry.get(association.reference()).ok_or_else(|| {
            format!(
                "association '{}' references unregistered '{}'",
                name,
                association.reference()
            )
        })?;
        hops.push(Hop {
            association,
            target,
        });
        schema = target;
    }
    Ok(hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{testing, ErrorKind};

    #[test]
    fn test_resolve_own_field() {
        let registry = testing::catalog();
        let product = registry.schema("product").unwrap();
        let path = FieldPath::resolve(&registry, product, "stock").unwrap();
        assert!(path.hops.is_empty());
        assert!(path.target.is_numeric());
        assert!(!path.is_to_many());
    }

    #[test]
    fn test_resolve_association_paths() {
        let registry = testing::catalog();
        let product = registry.schema("product").unwrap();

        let to_one = FieldPath::resolve(&registry, product, "manufacturer.name").unwrap();
        assert_eq!(to_one.hops.len(), 1);
        assert!(!to_one.is_to_many());

        let to_many = FieldPath::resolve(&registry, product, "prices.amount").unwrap();
        assert!(to_many.is_to_many());

        let translations = FieldPath::resolve(&registry, product, "translations.name").unwrap();
        assert!(translations.is_to_many());
        assert_eq!(translations.schema.entity, "product_translation");
    }

    #[test]
    fn test_resolve_id() {
        let registry = testing::catalog();
        let product = registry.schema("product").unwrap();
        let path = FieldPath::resolve(&registry, product, "manufacturer.id").unwrap();
        assert!(matches!(path.target, Target::Id));
        assert!(path.target.is_textual());
    }

    #[test]
    fn test_resolve_errors() {
        let registry = testing::catalog();
        let product = registry.schema("product").unwrap();

        for bad in ["colour", "manufacturer.colour", "supplier.name", "prices", "", "a..b"] {
            let err = FieldPath::resolve(&registry, product, bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCriteria, "path {:?}", bad);
        }
    }

    #[test]
    fn test_target_accepts() {
        let registry = testing::catalog();
        let product = registry.schema("product").unwrap();
        let stock = FieldPath::resolve(&registry, product, "stock").unwrap();
        assert!(stock.target.accepts(&Value::Int(1)));
        assert!(stock.target.accepts(&Value::Float(1.5)));
        assert!(stock.target.accepts(&Value::Null));
        assert!(!stock.target.accepts(&Value::from("1")));

        let active = FieldPath::resolve(&registry, product, "active").unwrap();
        assert!(!active.target.is_ordered());
        assert!(active.target.accepts(&Value::Bool(true)));
    }
}
