use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::AdminError;

/// A single identified entity of any resource.
///
/// The fields are kept as an ordered JSON object so that every resource can
/// share the same list pipeline. Payloads coming from a store are validated
/// with [`Record::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == "id" {
            return None;
        }
        self.fields.get(name)
    }

    /// Plain text of a field, empty when the field is missing.
    pub fn text(&self, name: &str) -> String {
        if name == "id" {
            return self.id.clone();
        }
        self.fields.get(name).map(display_value).unwrap_or_default()
    }

    pub fn status(&self) -> String {
        self.text("status")
    }

    /// Build a record from an untyped payload.
    ///
    /// The id is taken from `id` or `_id` and may be a string or an integer.
    pub fn from_value(value: Value) -> Result<Record, AdminError> {
        let Value::Object(mut fields) = value else {
            return Err(AdminError::InvalidRecord("expected a json object".into()));
        };
        let raw_id = fields
            .remove("id")
            .or_else(|| fields.remove("_id"))
            .ok_or_else(|| AdminError::InvalidRecord("record has no id".into()))?;
        let id = match raw_id {
            Value::String(s) if !s.is_empty() => s,
            Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
            other => {
                return Err(AdminError::InvalidRecord(format!(
                    "unsupported id value {other}"
                )));
            }
        };
        Ok(Record { id, fields })
    }

    /// Like [`Record::from_value`] but assigns a fresh id when none is present.
    pub fn from_value_or_new_id(value: Value) -> Result<Record, AdminError> {
        match value {
            Value::Object(mut fields) => {
                if !fields.contains_key("id") && !fields.contains_key("_id") {
                    fields.insert("id".to_string(), Value::String(new_id()));
                }
                Record::from_value(Value::Object(fields))
            }
            other => Record::from_value(other),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("id".to_string(), Value::String(self.id.clone()));
        for (k, v) in self.fields.iter() {
            object.insert(k.clone(), v.clone());
        }
        Value::Object(object)
    }

    /// Names of fields holding something worth showing.
    pub fn non_empty_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(_, v)| !is_empty_value(v))
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Render a json value as plain text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_string_and_numeric_ids() {
        let a = Record::from_value(json!({"id": "a1", "title": "Hello"})).unwrap();
        assert_eq!(a.id, "a1");
        assert_eq!(a.text("title"), "Hello");

        let b = Record::from_value(json!({"_id": 42, "title": "World"})).unwrap();
        assert_eq!(b.id, "42");
        assert!(b.get("_id").is_none());
    }

    #[test]
    fn rejects_payloads_without_id() {
        assert!(Record::from_value(json!({"title": "x"})).is_err());
        assert!(Record::from_value(json!(["id"])).is_err());
        assert!(Record::from_value(json!({"id": ""})).is_err());
    }

    #[test]
    fn missing_fields_render_empty() {
        let r = Record::new("1");
        assert_eq!(r.text("author"), "");
        assert_eq!(r.text("id"), "1");
    }

    #[test]
    fn display_value_flattens_arrays() {
        assert_eq!(display_value(&json!(["a", "b", null])), "a, b");
        assert_eq!(display_value(&json!(12.5)), "12.5");
        assert_eq!(display_value(&json!(null)), "");
    }

    #[test]
    fn serializes_with_flat_id() {
        let r = Record::new("7").with("title", "T");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v, json!({"id": "7", "title": "T"}));
        assert_eq!(r.to_value(), v);
    }
}
