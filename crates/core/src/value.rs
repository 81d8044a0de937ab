//! Wire attribute values
//!
//! This module defines:
//! - Value: the attribute value model shared by every backend
//! - Item: a wire record, an ordered map from attribute name to Value
//!
//! ## Type Rules
//!
//! - Different types are never equal: `Int(1) != Float(1.0)`
//! - `Bytes` are not `String`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - Ordering (used by `<`, `<=`, `>`, `>=` predicates) is only defined
//!   between values of the same scalar type; `Int` and `UInt` order as
//!   integers
//! - `UInt` only holds values above `i64::MAX`, every smaller integer is an
//!   `Int`, so one number has exactly one representation

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A wire record: attribute name to attribute value
///
/// Ordered so that request building and document bodies are deterministic.
pub type Item = BTreeMap<String, Value>;

/// Attribute value as it travels to and from a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Unsigned integer above `i64::MAX`
    UInt(u64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// List of values
    Array(Vec<Value>),
    /// Nested map
    Object(BTreeMap<String, Value>),
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::UInt(_) => "UInt",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is an empty string
    ///
    /// Key attributes treat an empty string as absent.
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty())
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as a nested map if this is an Object value
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Compare two values of the same scalar type
    ///
    /// Returns `None` for mixed types, containers, nulls and NaN. Predicates
    /// treat an undefined ordering as "condition not satisfied".
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::UInt(a), Value::UInt(b)) => Some(a.cmp(b)),
            (Value::Int(_), Value::UInt(_)) => Some(Ordering::Less),
            (Value::UInt(_), Value::Int(_)) => Some(Ordering::Greater),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for ergonomic predicate literals
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(u),
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Value::Object(o)
    }
}

// ============================================================================
// serde_json interop, the bridge used by the generic record marshaller
// ============================================================================

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::UInt(u) => serde_json::Value::Number(u.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            // Bytes have no JSON form; records that need raw bytes round-trip
            // them through a custom field codec instead
            Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_not_equal_float() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_nan_not_equal_nan() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_bytes_not_equal_string() {
        assert_ne!(Value::Bytes(b"abc".to_vec()), Value::from("abc"));
    }

    #[test]
    fn test_compare_same_type() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Float(2.5)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_compare_mixed_types_undefined() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.0)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Float(1.0)), None);
        assert_eq!(
            Value::Array(vec![]).compare(&Value::Array(vec![])),
            None
        );
    }

    #[test]
    fn test_is_empty_string() {
        assert!(Value::from("").is_empty_string());
        assert!(!Value::from("_").is_empty_string());
        assert!(!Value::Null.is_empty_string());
    }

    #[test]
    fn test_serde_json_nested_conversion() {
        let json = serde_json::json!({
            "name": "Verner Pleishner",
            "age": 64,
            "tags": ["a", "b"],
            "score": 1.5,
            "nested": {"ok": true, "none": null}
        });

        let value = Value::from(json.clone());
        let obj = value.as_object().unwrap();
        assert_eq!(obj["name"], Value::from("Verner Pleishner"));
        assert_eq!(obj["age"], Value::Int(64));
        assert_eq!(obj["score"], Value::Float(1.5));
        assert_eq!(
            obj["tags"],
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );

        let back = serde_json::Value::from(value);
        assert_eq!(back, json);
    }

    #[test]
    fn test_serde_json_large_u64_stays_exact() {
        let json = serde_json::json!(u64::MAX);
        let value = Value::from(json.clone());
        assert_eq!(value, Value::UInt(u64::MAX));
        assert_eq!(serde_json::Value::from(value), json);

        // anything that fits keeps the signed form
        assert_eq!(Value::from(serde_json::json!(7u64)), Value::Int(7));
        assert_eq!(Value::from(7u64), Value::Int(7));
        assert_eq!(Value::from(u64::MAX), Value::UInt(u64::MAX));
    }

    #[test]
    fn test_compare_across_integer_widths() {
        assert_eq!(
            Value::Int(i64::MAX).compare(&Value::UInt(u64::MAX)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::UInt(u64::MAX).compare(&Value::Int(-1)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::UInt(u64::MAX).compare(&Value::UInt(u64::MAX - 1)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_serde_json_nan_becomes_null() {
        let json = serde_json::Value::from(Value::Float(f64::NAN));
        assert!(json.is_null());
    }

    #[test]
    fn test_bytes_encode_as_base64_string() {
        let json = serde_json::Value::from(Value::Bytes(b"hello".to_vec()));
        assert_eq!(json, serde_json::json!("aGVsbG8="));
    }

    #[test]
    fn test_value_serde_roundtrip_keeps_types() {
        let mut item = Item::new();
        item.insert("b".into(), Value::Bytes(vec![1, 2, 3]));
        item.insert("i".into(), Value::Int(7));
        item.insert("f".into(), Value::Float(7.0));

        let text = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
    }
}
