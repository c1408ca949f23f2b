//! Result types for operation execution

use serde_json::Value;

use crate::value::DocumentId;

use super::store::PagingState;

/// Why a row was not mutated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFailure {
    /// Still conflicting after every retry
    WriteConflict,
    /// Update target gone or no longer matching on re-read
    NotFoundForUpdate,
    /// Mutator callback rejected the document
    Mutation(String),
}

/// Terminal state of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Succeeded,
    Failed(RowFailure),
    /// Delete target gone or no longer matching on re-read
    Skipped,
}

/// Outcome of one row's read → CAS sequence
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub id: DocumentId,
    pub status: RowStatus,
    /// Retries after the first attempt
    pub retries: u32,
    /// Snapshot the successful write was conditioned on
    pub before: Option<Value>,
    /// Written document; `None` for deletes
    pub after: Option<Value>,
}

impl RowOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RowStatus::Succeeded
    }
}

/// Result of a delete, update or replace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResult {
    /// One entry per started row, in read order
    pub outcomes: Vec<RowOutcome>,
    /// Rows selected for mutation
    pub matched_count: usize,
    /// `None` when a bulk clear removed an unknown number of rows
    pub modified_count: Option<usize>,
    /// More rows matched than the mutation limit allowed
    pub more_data: bool,
    /// Identity written by an upsert
    pub upserted_id: Option<DocumentId>,
    /// Document echoed by findOneAnd* commands
    pub document: Option<Value>,
    /// Cancellation stopped rows from starting
    pub cancelled: bool,
}

impl MutationResult {
    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RowStatus::Failed(_)))
    }
}

/// Result of a find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub documents: Vec<Value>,
    pub next_page: Option<PagingState>,
}

/// One document an insert could not write
#[derive(Debug, Clone, PartialEq)]
pub struct InsertFailure {
    /// Position in the request
    pub index: usize,
    pub id: Option<DocumentId>,
    pub code: &'static str,
    pub message: String,
}

/// Result of insertOne / insertMany
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// Identities written, in request order
    pub inserted_ids: Vec<DocumentId>,
    pub failures: Vec<InsertFailure>,
}
