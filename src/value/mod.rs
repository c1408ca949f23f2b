//! Shared value typing for filters, plans and rows
//!
//! Everything the filter compiler, the planner and the mutation engine agree
//! on when they talk about a field or a value:
//!
//! - `FieldPath`: dotted path to a document field
//! - `DocumentId`: typed value of the identity (`_id`) field
//! - `TypedValue`: typed operand carried by a predicate
//! - `IdentityCoercer`: turns raw JSON into a `DocumentId`

mod document_id;
mod identity;
mod path;
mod typed;

pub use document_id::DocumentId;
pub use identity::{IdentityCoercer, IdentityError, JsonIdentity, DEFAULT_ID_FIELD};
pub use path::{FieldPath, PathError};
pub use typed::{hash_json, TypedValue, ValueError};
