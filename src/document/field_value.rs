//! Field value types for documents.
//!
//! ```
//! use pike::document::field_value::FieldValue;
//!
//! let value = FieldValue::from_json(&serde_json::json!(["a", 2])).unwrap();
//! assert_eq!(
//!     value,
//!     FieldValue::List(vec![FieldValue::Text("a".into()), FieldValue::Integer(2)])
//! );
//! assert_eq!(FieldValue::Text("42".into()).as_i64(), Some(42));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PikeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    /// Convert a JSON value. Objects are not field values.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().ok_or_else(|| {
                    PikeError::document(format!("Unsupported number: {n}"))
                })?),
            },
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(FieldValue::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(_) => {
                return Err(PikeError::document("Nested objects are not field values"));
            }
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FieldValue::Null => Value::Null,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view: integers, integral floats and numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point view: numbers and numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String form of a scalar, as used for exact terms and facet labels.
    pub fn as_term_string(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::List(_) | FieldValue::Null => None,
        }
    }

    /// The scalar values carried by this value: list items, nothing for null,
    /// or the value itself.
    pub fn values(&self) -> Vec<&FieldValue> {
        match self {
            FieldValue::List(items) => items.iter().flat_map(|v| v.values()).collect(),
            FieldValue::Null => Vec::new(),
            other => vec![other],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}
