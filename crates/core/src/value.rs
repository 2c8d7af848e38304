//! Value type for entity fields
//!
//! This module defines:
//! - Value: unified enum for every field value stored in a row
//!
//! ## Type Rules
//!
//! - Seven types: Null, Bool, Int, Float, String, Array, Object
//! - No implicit type coercions for equality: `Int(1) != Float(1.0)`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - Ordering (for sorting and grouping) is total, see [`Value::total_cmp`]
//!
//! JSON interop is lossless for everything except non-finite floats, which
//! become `null`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Field value stored in an entity row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object with string keys (JSON object)
    Object(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Lowercase name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is an `Int` or a `Float`
    pub fn is_number(&self) -> bool {
        self.as_f64().is_some()
    }

    /// The bool of a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(flag) = self {
            Some(*flag)
        } else {
            None
        }
    }

    /// The integer of an `Int`
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// The float of a `Float` (an `Int` is not widened)
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(x) = self {
            Some(*x)
        } else {
            None
        }
    }

    /// Numeric value of an `Int` or a `Float`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(n) => Some(n as f64),
            Value::Float(x) => Some(x),
            _ => None,
        }
    }

    /// Text of a `String`
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(text) = self {
            Some(text.as_str())
        } else {
            None
        }
    }

    /// Elements of an `Array`
    pub fn as_array(&self) -> Option<&[Value]> {
        if let Value::Array(items) = self {
            Some(items.as_slice())
        } else {
            None
        }
    }

    /// Entries of an `Object`
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        if let Value::Object(entries) = self {
            Some(entries)
        } else {
            None
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    /// Total order used for sorting and grouping
    ///
    /// `Null < Bool < numbers < String < Array < Object`. Ints and floats are
    /// compared numerically; an Int sorts before a Float of equal magnitude so
    /// the order stays total. Floats use `f64::total_cmp`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! value_from {
    ($($source:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from($v: $source) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    &str => |v| Value::String(v.to_owned()),
    String => |v| Value::String(v),
    bool => |v| Value::Bool(v),
    i64 => |v| Value::Int(v),
    i32 => |v| Value::Int(i64::from(v)),
    f64 => |v| Value::Float(v),
    Vec<Value> => |v| Value::Array(v),
    crate::types::EntityId => |v| Value::String(v.to_string()),
}

// ============================================================================
// serde_json interop
// ============================================================================

type Json = serde_json::Value;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(flag) => Value::Bool(flag),
            // u64 beyond i64 range and real numbers become floats
            Json::Number(number) => number
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::Float(number.as_f64().unwrap_or_default())),
            Json::String(text) => Value::String(text),
            Json::Array(items) => items.into_iter().map(Value::from).collect::<Vec<_>>().into(),
            Json::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Bool(flag) => Json::Bool(flag),
            Value::Int(n) => Json::from(n),
            Value::Float(x) => serde_json::Number::from_f64(x).map_or(Json::Null, Json::Number),
            Value::String(text) => Json::String(text),
            Value::Array(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            Value::Object(entries) => Json::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Json::from(item)))
                    .collect(),
            ),
        }
    }
}
