//! Property values carried by nodes and edges
//!
//! Archive records arrive as JSON, so the main way into this type is
//! [`PropertyValue::from_json`]. Values are kept to what a Bolt-speaking
//! store accepts as a node property: scalars and lists. Nested objects are
//! flattened to their JSON text on the way in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<PropertyValue>),
    Null,
}

impl PropertyValue {
    /// Convert a JSON value into a storable property value.
    ///
    /// Objects become their compact JSON text; numbers that do not fit an
    /// `i64` fall back to `f64`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Array(items) => {
                PropertyValue::Array(items.iter().map(PropertyValue::from_json).collect())
            }
            Value::Object(_) => PropertyValue::String(value.to_string()),
        }
    }

    /// Render back to JSON (used by reports and the CLI)
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Integer(i) => Value::from(*i),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::Array(items) => {
                Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Null => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Key used by unique property indices. Only scalar values can act as a
    /// merge key; floats are excluded because equality on them is unreliable.
    pub fn index_key(&self) -> Option<String> {
        match self {
            PropertyValue::String(s) => Some(s.clone()),
            PropertyValue::Integer(i) => Some(i.to_string()),
            PropertyValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Array(_) => "Array",
            PropertyValue::Null => "Null",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(items)
    }
}

/// Property map for nodes and edges
pub type PropertyMap = HashMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars_and_lists() {
        assert_eq!(PropertyValue::from_json(&json!("x")), PropertyValue::from("x"));
        assert_eq!(PropertyValue::from_json(&json!(42)), PropertyValue::Integer(42));
        assert_eq!(PropertyValue::from_json(&json!(1.5)), PropertyValue::Float(1.5));
        assert_eq!(PropertyValue::from_json(&json!(true)), PropertyValue::Boolean(true));
        assert!(PropertyValue::from_json(&json!(null)).is_null());

        let langs = PropertyValue::from_json(&json!(["en", "de"]));
        assert_eq!(langs.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_objects_are_flattened_to_text() {
        let value = PropertyValue::from_json(&json!({"a": 1}));
        assert_eq!(value.as_string(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_index_key() {
        assert_eq!(PropertyValue::from("10.1/a").index_key().as_deref(), Some("10.1/a"));
        assert_eq!(PropertyValue::Integer(5).index_key().as_deref(), Some("5"));
        assert_eq!(PropertyValue::Float(0.5).index_key(), None);
        assert_eq!(PropertyValue::Null.index_key(), None);
    }

    #[test]
    fn test_json_roundtrip_of_list() {
        let value = PropertyValue::Array(vec!["a".into(), 2i64.into()]);
        assert_eq!(value.to_json(), json!(["a", 2]));
        assert_eq!(value.type_name(), "Array");
    }
}
