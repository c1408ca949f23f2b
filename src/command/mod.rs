//! Command model
//!
//! The shape in which the deserialization layer hands a command over:
//! kind, filter clause, sort clause, options and the mutation payload.

mod model;
mod parse;
mod vectorize;

pub use model::{
    Command, CommandKind, CommandOptions, ReturnDocument, SortField, SortSpec, VectorSort,
};
pub use parse::{parse_options, parse_sort};
pub use vectorize::{resolve_vectorize, EmbeddingError, EmbeddingProvider};
