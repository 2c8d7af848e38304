//! Write payload coercion
//!
//! Payloads arrive as JSON objects. Every scalar field is coerced to the
//! stored [`Value`] representation of its declared type:
//!
//! | field type | accepted JSON | stored as |
//! |------------|---------------|-----------|
//! | string, text | string | `String` |
//! | int | integer | `Int` |
//! | float | any number | `Float` |
//! | bool | bool | `Bool` |
//! | json | anything | converted value |
//! | datetime | RFC 3339 string | `String`, normalized to UTC |
//! | foreign key | UUID string | `String`, hyphenated lowercase |
//!
//! `null` is accepted for optional fields only.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Map;
use trellis_core::{
    EntityId, EntitySchema, FieldDefinition, FieldType, TrellisError, TrellisResult, Value,
    ID_FIELD,
};

/// A JSON object payload
pub(crate) type Payload = Map<String, serde_json::Value>;

/// Borrow `raw` as an object payload
pub(crate) fn as_object<'p>(
    schema: &EntitySchema,
    raw: &'p serde_json::Value,
) -> TrellisResult<&'p Payload> {
    raw.as_object().ok_or_else(|| {
        TrellisError::validation(
            &schema.entity,
            "*",
            format!("payload must be a JSON object, got {}", json_type(raw)),
        )
    })
}

/// The `id` of a payload, if present
pub(crate) fn payload_id(
    schema: &EntitySchema,
    payload: &Payload,
) -> TrellisResult<Option<EntityId>> {
    match payload.get(ID_FIELD) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => EntityId::parse(s).map(Some).ok_or_else(|| {
            TrellisError::validation(&schema.entity, ID_FIELD, format!("'{}' is not a UUID", s))
        }),
        Some(other) => Err(TrellisError::validation(
            &schema.entity,
            ID_FIELD,
            format!("expected a UUID string, got {}", json_type(other)),
        )),
    }
}

/// Coerce `raw` to the stored value of `field`
pub(crate) fn coerce(
    schema: &EntitySchema,
    field: &FieldDefinition,
    raw: &serde_json::Value,
) -> TrellisResult<Value> {
    let mismatch = |expected: &str| {
        TrellisError::validation(
            &schema.entity,
            &field.name,
            format!("expected {}, got {}", expected, json_type(raw)),
        )
    };

    if raw.is_null() {
        if field.required {
            return Err(TrellisError::validation(
                &schema.entity,
                &field.name,
                "required field must not be null",
            ));
        }
        return Ok(Value::Null);
    }

    match &field.field_type {
        FieldType::String | FieldType::Text => raw
            .as_str()
            .map(Value::from)
            .ok_or_else(|| mismatch("a string")),
        FieldType::Int => raw.as_i64().map(Value::Int).ok_or_else(|| mismatch("an integer")),
        FieldType::Float => raw.as_f64().map(Value::Float).ok_or_else(|| mismatch("a number")),
        FieldType::Bool => raw.as_bool().map(Value::Bool).ok_or_else(|| mismatch("a bool")),
        FieldType::Json => Ok(Value::from(raw.clone())),
        FieldType::DateTime => {
            let text = raw.as_str().ok_or_else(|| mismatch("an RFC 3339 string"))?;
            let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
                TrellisError::validation(
                    &schema.entity,
                    &field.name,
                    format!("invalid datetime '{}': {}", text, e),
                )
            })?;
            Ok(Value::String(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ))
        }
        FieldType::ForeignKey { .. } => {
            let text = raw.as_str().ok_or_else(|| mismatch("a UUID string"))?;
            EntityId::parse(text)
                .map(|id| Value::String(id.to_string()))
                .ok_or_else(|| {
                    TrellisError::validation(
                        &schema.entity,
                        &field.name,
                        format!("'{}' is not a UUID", text),
                    )
                })
        }
    }
}

fn json_type(raw: &serde_json::Value) -> &'static str {
    match raw {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
