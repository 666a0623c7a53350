// src/core/lookup.rs

//! The external lookup collaborator used by reference options, plus an
//! in-memory implementation over JSON records.

use crate::core::context::display_value;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A `(value, label)` pair offered to forms.
pub type Choice = (Value, String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("No record matches {field} = {key}.")]
    NotFound { field: String, key: String },
    #[error("{count} records match {field} = {key}, expected exactly one.")]
    MultipleMatches {
        field: String,
        key: String,
        count: usize,
    },
}

/// A collection of entities a reference option can point at.
pub trait Lookup: Send + Sync + fmt::Debug {
    /// Returns the single record whose `field` equals `key`.
    fn get(&self, field: &str, key: &Value) -> Result<Value, LookupError>;

    /// Returns every record whose `field` equals one of `keys`, in collection order.
    fn filter(&self, field: &str, keys: &[Value]) -> Vec<Value>;

    /// Choices for presentation. With `fields`, the first is the value and the
    /// second (if any) the label.
    fn choices(&self, fields: &[String]) -> Vec<Choice>;
}

/// Compares a stored field against a key given on input. Keys usually arrive
/// as strings ("3") while records store typed values (3).
pub(crate) fn key_matches(candidate: &Value, key: &Value) -> bool {
    if candidate == key {
        return true;
    }
    match (candidate, key) {
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => false,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => display_value(candidate) == display_value(key),
    }
}

/// An in-memory [`Lookup`] over JSON objects.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Map<String, Value>>,
    label_field: Option<String>,
}

impl RecordSet {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self {
            records,
            label_field: None,
        }
    }

    /// Builds a record set from a JSON array, skipping anything that is not an object.
    pub fn from_value(value: Value) -> Self {
        let records = match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Self::new(records)
    }

    /// Field used as the human label when choices are listed without explicit fields.
    pub fn label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = Some(field.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching<'a>(
        &'a self,
        field: &'a str,
        key: &'a Value,
    ) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.records
            .iter()
            .filter(move |record| record.get(field).is_some_and(|v| key_matches(v, key)))
    }
}

impl Lookup for RecordSet {
    fn get(&self, field: &str, key: &Value) -> Result<Value, LookupError> {
        let found: Vec<&Map<String, Value>> = self.matching(field, key).collect();
        match found.as_slice() {
            [record] => Ok(Value::Object((*record).clone())),
            [] => Err(LookupError::NotFound {
                field: field.to_string(),
                key: display_value(key),
            }),
            many => Err(LookupError::MultipleMatches {
                field: field.to_string(),
                key: display_value(key),
                count: many.len(),
            }),
        }
    }

    fn filter(&self, field: &str, keys: &[Value]) -> Vec<Value> {
        self.records
            .iter()
            .filter(|record| {
                record
                    .get(field)
                    .is_some_and(|v| keys.iter().any(|key| key_matches(v, key)))
            })
            .cloned()
            .map(Value::Object)
            .collect()
    }

    fn choices(&self, fields: &[String]) -> Vec<Choice> {
        self.records
            .iter()
            .map(|record| match fields {
                [value_field, label_field, ..] => (
                    record.get(value_field).cloned().unwrap_or(Value::Null),
                    record.get(label_field).map(display_value).unwrap_or_default(),
                ),
                [value_field] => {
                    let value = record.get(value_field).cloned().unwrap_or(Value::Null);
                    let label = display_value(&value);
                    (value, label)
                }
                [] => {
                    let pk = record
                        .get(crate::constants::DEFAULT_REFERENCE_KEY)
                        .cloned()
                        .unwrap_or(Value::Null);
                    let label = self
                        .label_field
                        .as_deref()
                        .and_then(|f| record.get(f))
                        .map(display_value)
                        .unwrap_or_else(|| display_value(&pk));
                    (pk, label)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn regions() -> RecordSet {
        RecordSet::from_value(json!([
            {"pk": 1, "code": "north", "name": "North"},
            {"pk": 2, "code": "south", "name": "South"},
            {"pk": 3, "code": "south", "name": "Deep South"},
        ]))
        .label_field("name")
    }

    #[test]
    fn test_get_exact_match_with_loose_key() {
        let record = regions().get("pk", &json!("2")).unwrap();
        assert_eq!(record["name"], json!("South"));
    }

    #[test]
    fn test_get_errors() {
        assert!(matches!(
            regions().get("pk", &json!(9)),
            Err(LookupError::NotFound { .. })
        ));
        assert!(matches!(
            regions().get("code", &json!("south")),
            Err(LookupError::MultipleMatches { count: 2, .. })
        ));
    }

    #[test]
    fn test_filter_membership_keeps_record_order() {
        let found = regions().filter("pk", &[json!(3), json!("1")]);
        let names: Vec<&Value> = found.iter().map(|r| &r["name"]).collect();
        assert_eq!(names, vec![&json!("North"), &json!("Deep South")]);
    }

    #[test]
    fn test_choices() {
        let default_choices = regions().choices(&[]);
        assert_eq!(default_choices[0], (json!(1), "North".to_string()));

        let by_fields = regions().choices(&["code".into(), "name".into()]);
        assert_eq!(by_fields[1], (json!("south"), "South".to_string()));
    }
}
