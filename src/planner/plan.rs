//! Read plan
//!
//! The concrete read parameters derived for one command. Built once by the
//! planner, read-only afterwards, owned by the operation that wraps it.

use crate::command::SortField;
use crate::filter::Expression;
use crate::value::DocumentId;

/// Row limit of reads with no bound
pub const UNBOUNDED: usize = usize::MAX;

/// What a read returns per row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadShape {
    /// Identity only
    KeyOnly,
    /// Full documents, store order (or similarity order for vectors)
    Document,
    /// Full documents, sorted in memory by `order_by`
    SortedDocument,
}

impl ReadShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadShape::KeyOnly => "KEY_ONLY",
            ReadShape::Document => "DOCUMENT",
            ReadShape::SortedDocument => "SORTED_DOCUMENT",
        }
    }

    pub fn returns_documents(&self) -> bool {
        !matches!(self, ReadShape::KeyOnly)
    }
}

impl std::fmt::Display for ReadShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable read plan.
///
/// `read_shape == SortedDocument` iff `order_by` is set and `vector` is not.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan {
    pub expression: Expression,
    pub order_by: Option<Vec<SortField>>,
    pub vector: Option<Vec<f32>>,
    pub page_size: usize,
    pub row_limit: usize,
    pub read_shape: ReadShape,
    pub single_response: bool,
    pub skip: usize,
    /// Rows a sorted read may buffer; 0 unless sorting without a vector
    pub max_buffered_sort_rows: usize,
}

impl ReadPlan {
    pub fn is_unbounded(&self) -> bool {
        self.row_limit == UNBOUNDED
    }

    /// Keys to read directly when the filter is a pure identity lookup
    pub fn key_lookup(&self) -> Option<Vec<DocumentId>> {
        self.expression.identity_lookup()
    }

    /// Same plan with another row limit
    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }
}
