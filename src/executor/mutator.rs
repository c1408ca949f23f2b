//! Document mutators
//!
//! Update-operator application lives outside this crate. The executor only
//! needs a callback from the current document to the new one.

use serde_json::Value;
use thiserror::Error;

use crate::value::DEFAULT_ID_FIELD;

/// Failure reported by a mutator callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MutationError(pub String);

/// Computes the new state of a document.
pub trait DocumentMutator: Send + Sync {
    fn apply(&self, current: &Value) -> Result<Value, MutationError>;
}

impl<F> DocumentMutator for F
where
    F: Fn(&Value) -> Result<Value, MutationError> + Send + Sync,
{
    fn apply(&self, current: &Value) -> Result<Value, MutationError> {
        self(current)
    }
}

/// Replaces the whole document, keeping the current identity.
#[derive(Debug, Clone)]
pub struct Replacement {
    document: Value,
}

impl Replacement {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl DocumentMutator for Replacement {
    fn apply(&self, current: &Value) -> Result<Value, MutationError> {
        let Value::Object(replacement) = &self.document else {
            return Err(MutationError("Replacement must be an object".into()));
        };
        let current_id = current.get(DEFAULT_ID_FIELD);
        if let (Some(new_id), Some(old_id)) = (replacement.get(DEFAULT_ID_FIELD), current_id) {
            if new_id != old_id {
                return Err(MutationError(format!(
                    "Replacement may not change {} from {} to {}",
                    DEFAULT_ID_FIELD, old_id, new_id
                )));
            }
        }

        let mut document = serde_json::Map::new();
        if let Some(id) = current_id {
            document.insert(DEFAULT_ID_FIELD.to_string(), id.clone());
        }
        for (key, value) in replacement {
            if key != DEFAULT_ID_FIELD || current_id.is_none() {
                document.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Object(document))
    }
}
