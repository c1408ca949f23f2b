//! Typed predicate operands

use std::hash::{Hash, Hasher};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

use super::document_id::DocumentId;

/// Literal typing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Invalid $date value: {0}")]
    InvalidDate(String),

    #[error("Unexpected operator '{0}' in literal")]
    UnexpectedOperator(String),
}

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// Single identity value
    Id(DocumentId),
    /// Identity list (`$in`/`$nin` on the identity field); may be empty
    Ids(Vec<DocumentId>),
    Text(String),
    Number(Number),
    Boolean(bool),
    Null,
    Date(DateTime<Utc>),
    /// Exact array literal
    Array(Vec<Value>),
    /// Exact sub-document literal
    SubDocument(Map<String, Value>),
    /// Value list for `$in`/`$nin`/`$all` on regular fields; may be empty
    Values(Vec<TypedValue>),
    /// Non-negative `$size` operand
    Size(u64),
    /// `$exists` operand
    Exists(bool),
}

impl TypedValue {
    /// Types a JSON literal (an operand or a plain equality value).
    ///
    /// Objects are sub-document literals unless they are `{"$date": ms}`;
    /// any other `$`-prefixed key is rejected.
    pub fn from_literal(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(TypedValue::Text(s.clone())),
            Value::Number(n) => Ok(TypedValue::Number(n.clone())),
            Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
            Value::Null => Ok(TypedValue::Null),
            Value::Array(items) => Ok(TypedValue::Array(items.clone())),
            Value::Object(map) => {
                if let Some(date) = map.get("$date").filter(|_| map.len() == 1) {
                    return parse_date(date).map(TypedValue::Date);
                }
                if let Some(key) = map.keys().find(|k| k.starts_with('$')) {
                    return Err(ValueError::UnexpectedOperator(key.clone()));
                }
                Ok(TypedValue::SubDocument(map.clone()))
            }
        }
    }

    /// Short type name for messages and explain output
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Id(_) => "id",
            TypedValue::Ids(_) => "id-list",
            TypedValue::Text(_) => "text",
            TypedValue::Number(_) => "number",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::Null => "null",
            TypedValue::Date(_) => "date",
            TypedValue::Array(_) => "array",
            TypedValue::SubDocument(_) => "sub-document",
            TypedValue::Values(_) => "value-list",
            TypedValue::Size(_) => "size",
            TypedValue::Exists(_) => "exists",
        }
    }

    /// True for operands that have a natural order (range operators)
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            TypedValue::Text(_) | TypedValue::Number(_) | TypedValue::Date(_)
        )
    }

    /// JSON rendering, using the extended `$date` form for dates
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Id(id) => id.to_json(),
            TypedValue::Ids(ids) => Value::Array(ids.iter().map(DocumentId::to_json).collect()),
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Number(n) => Value::Number(n.clone()),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Null => Value::Null,
            TypedValue::Date(d) => json!({ "$date": d.timestamp_millis() }),
            TypedValue::Array(items) => Value::Array(items.clone()),
            TypedValue::SubDocument(map) => Value::Object(map.clone()),
            TypedValue::Values(values) => {
                Value::Array(values.iter().map(TypedValue::to_json).collect())
            }
            TypedValue::Size(n) => Value::from(*n),
            TypedValue::Exists(b) => Value::Bool(*b),
        }
    }
}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypedValue::Id(id) => id.hash(state),
            TypedValue::Ids(ids) => ids.hash(state),
            TypedValue::Text(s) => s.hash(state),
            TypedValue::Number(n) => n.hash(state),
            TypedValue::Boolean(b) | TypedValue::Exists(b) => b.hash(state),
            TypedValue::Null => {}
            TypedValue::Date(d) => d.hash(state),
            TypedValue::Array(items) => {
                state.write_usize(items.len());
                for item in items {
                    hash_json(item, state);
                }
            }
            TypedValue::SubDocument(map) => hash_json_object(map, state),
            TypedValue::Values(values) => values.hash(state),
            TypedValue::Size(n) => n.hash(state),
        }
    }
}

/// Hashes a JSON value consistently with its `PartialEq`.
///
/// Object keys are hashed in sorted order since map equality ignores
/// insertion order.
pub fn hash_json<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(2);
            n.hash(state);
        }
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_json(item, state);
            }
        }
        Value::Object(map) => {
            state.write_u8(5);
            hash_json_object(map, state);
        }
    }
}

fn hash_json_object<H: Hasher>(map: &Map<String, Value>, state: &mut H) {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    state.write_usize(entries.len());
    for (key, value) in entries {
        key.hash(state);
        hash_json(value, state);
    }
}

fn parse_date(value: &Value) -> Result<DateTime<Utc>, ValueError> {
    value
        .as_i64()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| ValueError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &TypedValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_literal_typing() {
        assert_eq!(
            TypedValue::from_literal(&json!("x")).unwrap(),
            TypedValue::Text("x".into())
        );
        assert_eq!(
            TypedValue::from_literal(&json!(null)).unwrap(),
            TypedValue::Null
        );
        assert!(matches!(
            TypedValue::from_literal(&json!({"$date": 0})).unwrap(),
            TypedValue::Date(_)
        ));
        assert!(matches!(
            TypedValue::from_literal(&json!({"a": 1})).unwrap(),
            TypedValue::SubDocument(_)
        ));
    }

    #[test]
    fn test_literal_rejects_operators() {
        assert_eq!(
            TypedValue::from_literal(&json!({"$gt": 1})),
            Err(ValueError::UnexpectedOperator("$gt".into()))
        );
        assert!(matches!(
            TypedValue::from_literal(&json!({"$date": "yesterday"})),
            Err(ValueError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_sub_document_hash_ignores_key_order() {
        let a = TypedValue::from_literal(&json!({"x": 1, "y": [1, 2]})).unwrap();
        let b = TypedValue::from_literal(&json!({"y": [1, 2], "x": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_ordered_operands() {
        assert!(TypedValue::Number(Number::from(1)).is_ordered());
        assert!(!TypedValue::Boolean(true).is_ordered());
        assert!(!TypedValue::Array(vec![]).is_ordered());
    }
}
