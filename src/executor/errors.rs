//! Executor error types
//!
//! Operation-level failures only. Per-row outcomes (conflicts, vanished
//! rows, mutator failures) are reported in `RowStatus`, never as `Err`.

use thiserror::Error;

use crate::value::DocumentId;

/// Operation-level execution failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    /// Store failure; propagated as-is, never retried here
    #[error("Row store unavailable: {0}")]
    Unavailable(String),

    /// Insert-if-absent found an existing row
    #[error("Document already exists: {0}")]
    DuplicateDocument(DocumentId),

    /// Mutator callback failed outside a per-row sequence (upsert seed)
    #[error("Mutation failed: {0}")]
    Mutation(String),

    /// A sorted read matched more rows than it may buffer
    #[error("Sort buffer exceeded: more than {limit} matching rows")]
    SortBufferExceeded { limit: usize },

    /// insertMany above the configured maximum
    #[error("Too many documents: {count} (max {max})")]
    TooManyDocuments { count: usize, max: usize },
}

impl ExecutorError {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::Unavailable(_) => "DOC_STORE_UNAVAILABLE",
            ExecutorError::DuplicateDocument(_) => "DOC_DUPLICATE_DOCUMENT",
            ExecutorError::Mutation(_) => "DOC_MUTATION_FAILED",
            ExecutorError::SortBufferExceeded { .. } => "DOC_SORT_BUFFER_EXCEEDED",
            ExecutorError::TooManyDocuments { .. } => "DOC_TOO_MANY_DOCUMENTS",
        }
    }

    /// Store failures belong to the infrastructure, everything else to the request
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ExecutorError::Unavailable(_))
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ExecutorError::DuplicateDocument(DocumentId::string("a"));
        assert_eq!(err.code(), "DOC_DUPLICATE_DOCUMENT");
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Document already exists: \"a\"");

        let err = ExecutorError::Unavailable("timeout".into());
        assert!(!err.is_client_error());
    }
}
