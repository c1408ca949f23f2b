//! Identity typing collaborator
//!
//! How a raw JSON scalar becomes the identity field's typed value is owned by
//! an `IdentityCoercer`. `JsonIdentity` is the default used by the compiler
//! and the mutation engine.

use chrono::TimeZone;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::document_id::DocumentId;

/// Name of the identity field unless a coercer says otherwise
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Identity coercion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Unsupported identity value: {0}")]
    Unsupported(String),

    #[error("Invalid $uuid value: {0}")]
    InvalidUuid(String),

    #[error("Invalid $objectId value: {0}")]
    InvalidObjectId(String),

    #[error("Invalid $date value: {0}")]
    InvalidDate(String),
}

/// Turns raw JSON into typed identity values.
pub trait IdentityCoercer: Send + Sync {
    /// Name of the identity field
    fn field_name(&self) -> &str {
        DEFAULT_ID_FIELD
    }

    /// Coerce a raw JSON value into a `DocumentId`
    fn coerce(&self, raw: &Value) -> Result<DocumentId, IdentityError>;

    /// Extract the identity of a document, if it carries a valid one
    fn extract(&self, document: &Value) -> Option<DocumentId> {
        document
            .get(self.field_name())
            .and_then(|raw| self.coerce(raw).ok())
    }
}

/// Default coercer for JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonIdentity;

impl IdentityCoercer for JsonIdentity {
    fn coerce(&self, raw: &Value) -> Result<DocumentId, IdentityError> {
        match raw {
            Value::String(s) => Ok(DocumentId::String(s.clone())),
            Value::Number(n) => Ok(DocumentId::Number(n.clone())),
            Value::Bool(b) => Ok(DocumentId::Boolean(*b)),
            Value::Null => Ok(DocumentId::Null),
            Value::Object(map) if map.len() == 1 => {
                let (key, value) = map
                    .iter()
                    .next()
                    .ok_or_else(|| IdentityError::Unsupported(raw.to_string()))?;
                match key.as_str() {
                    "$date" => {
                        let millis = value
                            .as_i64()
                            .ok_or_else(|| IdentityError::InvalidDate(value.to_string()))?;
                        chrono::Utc
                            .timestamp_millis_opt(millis)
                            .single()
                            .map(DocumentId::Date)
                            .ok_or_else(|| IdentityError::InvalidDate(value.to_string()))
                    }
                    "$uuid" => value
                        .as_str()
                        .and_then(|s| Uuid::parse_str(s).ok())
                        .map(DocumentId::Uuid)
                        .ok_or_else(|| IdentityError::InvalidUuid(value.to_string())),
                    "$objectId" => match value.as_str() {
                        Some(s) if s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()) => {
                            Ok(DocumentId::ObjectId(s.to_ascii_lowercase()))
                        }
                        _ => Err(IdentityError::InvalidObjectId(value.to_string())),
                    },
                    _ => Err(IdentityError::Unsupported(raw.to_string())),
                }
            }
            _ => Err(IdentityError::Unsupported(raw.to_string())),
        }
    }
}
