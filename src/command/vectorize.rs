//! `$vectorize` resolution
//!
//! A `$vectorize` sort carries text that an external embedding service turns
//! into a query vector. Resolution happens before planning; the planner only
//! ever sees `$vector`.

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::planner::{PlannerError, PlannerResult};

use super::model::{Command, VectorSort};

/// Embedding service failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding service returned no vector")]
    Empty,
}

/// Embedding service contract
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one text into a vector
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;
}

/// Replaces a `$vectorize` sort with the embedded `$vector`.
///
/// Commands without `$vectorize` are returned unchanged.
pub async fn resolve_vectorize(
    mut command: Command,
    provider: &dyn EmbeddingProvider,
) -> PlannerResult<Command> {
    let text = match command.vector_sort() {
        Some(VectorSort::Vectorize(text)) => text.clone(),
        _ => return Ok(command),
    };

    let vector = provider
        .embed(&text)
        .await
        .map_err(|e| PlannerError::vectorize_unresolved(e.to_string()))?;
    if vector.is_empty() {
        return Err(PlannerError::vectorize_unresolved(
            EmbeddingError::Empty.to_string(),
        ));
    }

    if let Some(sort) = command.sort.as_mut() {
        sort.vector = Some(VectorSort::Vector(vector));
    }
    Ok(command)
}
