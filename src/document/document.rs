//! Document structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::field_value::FieldValue;
use crate::error::{PikeError, Result};

/// Reserved name of the identity field.
pub const ID_FIELD: &str = "$id$";

/// A document: field name to value, plus the optional identity under
/// [`ID_FIELD`].
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a document with an explicit identity.
    pub fn with_id<S: Into<String>>(id: S) -> Self {
        let mut doc = Document::new();
        doc.add_field(ID_FIELD, FieldValue::Text(id.into()));
        doc
    }

    /// Builder form of [`Document::add_field`].
    pub fn field<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.add_field(name, value.into());
        self
    }

    pub fn add_field<S: Into<String>>(&mut self, name: S, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The caller-supplied identity, if any.
    pub fn identity(&self) -> Result<Option<String>> {
        match self.fields.get(ID_FIELD) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Text(s)) if s.is_empty() => {
                Err(PikeError::document("The identity must not be empty"))
            }
            Some(value @ (FieldValue::Text(_) | FieldValue::Integer(_))) => {
                Ok(value.as_term_string())
            }
            Some(other) => Err(PikeError::document(format!(
                "The identity must be a string or an integer: {other:?}"
            ))),
        }
    }

    /// Build a document from a JSON object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| PikeError::document("A document must be a JSON object"))?;

        let mut doc = Document::new();
        for (name, value) in object {
            doc.add_field(name.clone(), FieldValue::from_json(value)?);
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        assert_eq!(Document::with_id("a1").identity().unwrap(), Some("a1".to_string()));
        assert_eq!(Document::new().identity().unwrap(), None);

        let doc = Document::new().field(ID_FIELD, 12i64);
        assert_eq!(doc.identity().unwrap(), Some("12".to_string()));

        let doc = Document::new().field(ID_FIELD, 1.5f64);
        assert!(doc.identity().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let json = json!({"$id$": "x", "title": "Hello", "price": 10, "tags": ["a", "b"]});
        let doc = Document::from_json(&json).unwrap();

        assert_eq!(doc.len(), 4);
        assert_eq!(doc.get_field("price"), Some(&FieldValue::Integer(10)));
        assert_eq!(doc.to_json(), json);
        assert!(Document::from_json(&json!([1])).is_err());
    }
}
