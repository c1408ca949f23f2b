//! Typed identity values

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{json, Number, Value};
use uuid::Uuid;

/// Value of a document's identity field.
///
/// Identity values support equality and hashing only; no ordering is
/// defined across the variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    String(String),
    Number(Number),
    Boolean(bool),
    Null,
    /// `{"$date": <epoch millis>}`
    Date(DateTime<Utc>),
    /// `{"$uuid": "..."}`
    Uuid(Uuid),
    /// `{"$objectId": "<24 hex chars>"}`
    ObjectId(String),
}

impl DocumentId {
    pub fn string(value: impl Into<String>) -> Self {
        DocumentId::String(value.into())
    }

    /// Type discriminator stored alongside the key text in the row key.
    pub fn type_code(&self) -> u8 {
        match self {
            DocumentId::String(_) => 1,
            DocumentId::Number(_) => 2,
            DocumentId::Boolean(_) => 3,
            DocumentId::Null => 4,
            DocumentId::Date(_) => 5,
            DocumentId::Uuid(_) => 6,
            DocumentId::ObjectId(_) => 7,
        }
    }

    /// Textual half of the row key.
    pub fn key_text(&self) -> String {
        match self {
            DocumentId::String(s) => s.clone(),
            DocumentId::Number(n) => n.to_string(),
            DocumentId::Boolean(b) => b.to_string(),
            DocumentId::Null => String::new(),
            DocumentId::Date(d) => d.timestamp_millis().to_string(),
            DocumentId::Uuid(u) => u.to_string(),
            DocumentId::ObjectId(o) => o.clone(),
        }
    }

    /// JSON representation as it appears in a document
    pub fn to_json(&self) -> Value {
        match self {
            DocumentId::String(s) => Value::String(s.clone()),
            DocumentId::Number(n) => Value::Number(n.clone()),
            DocumentId::Boolean(b) => Value::Bool(*b),
            DocumentId::Null => Value::Null,
            DocumentId::Date(d) => json!({ "$date": d.timestamp_millis() }),
            DocumentId::Uuid(u) => json!({ "$uuid": u.to_string() }),
            DocumentId::ObjectId(o) => json!({ "$objectId": o }),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::String(s) => write!(f, "\"{}\"", s),
            DocumentId::Null => write!(f, "null"),
            DocumentId::Date(d) => write!(f, "$date:{}", d.timestamp_millis()),
            DocumentId::Uuid(u) => write!(f, "$uuid:{}", u),
            DocumentId::ObjectId(o) => write!(f, "$objectId:{}", o),
            other => write!(f, "{}", other.key_text()),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_distinguishes_types() {
        let text = DocumentId::string("1");
        let number = DocumentId::Number(Number::from(1));

        assert_eq!(text.key_text(), number.key_text());
        assert_ne!(text.type_code(), number.type_code());
        assert_ne!(text, number);
    }

    #[test]
    fn test_to_json() {
        let id = DocumentId::ObjectId("5f0c3b0e9d1e8a0b8c8d4e5f".into());
        assert_eq!(id.to_json(), json!({"$objectId": "5f0c3b0e9d1e8a0b8c8d4e5f"}));
        assert_eq!(DocumentId::from("doc1").to_json(), json!("doc1"));
    }
}
