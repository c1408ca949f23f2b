//! Row store contract
//!
//! The wide-column store as seen by the executor. Every call returns a boxed
//! `Send` future so implementations may be network-backed.
//!
//! Read contract:
//! - `Document`/`KeyOnly` reads are paged: at most `page_size` rows per page,
//!   `skip` rows dropped first, never more than `row_limit` rows overall.
//! - `SortedDocument` and vector reads return one page holding the ordered
//!   window `[skip, skip + row_limit)`.
//! - `KeyOnly` rows carry no document.

use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use crate::planner::ReadPlan;
use crate::value::DocumentId;

use super::errors::ExecutorResult;

/// Boxed future returned by store calls
pub type StoreFuture<'a, T> = BoxFuture<'a, ExecutorResult<T>>;

/// One row as read
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: DocumentId,
    /// Version written by the last successful write; the CAS condition
    pub tx_id: Uuid,
    /// `None` for key-only reads
    pub document: Option<Value>,
}

/// Opaque continuation of a paged read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingState(pub String);

/// One page of a read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Set when more rows are available within the row limit
    pub next: Option<PagingState>,
}

/// Result of a count read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountResult {
    pub count: usize,
    /// More than the counted rows matched
    pub more_data: bool,
}

/// Result of a compare-and-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// The row changed (or vanished) since it was read
    Conflict,
}

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Wide-column store operations needed by the executor.
pub trait RowStore: Send + Sync {
    /// Reads one page of rows selected by the plan.
    fn read<'a>(
        &'a self,
        plan: &'a ReadPlan,
        paging: Option<&'a PagingState>,
    ) -> StoreFuture<'a, Page>;

    /// Fresh full read of one row.
    fn read_row<'a>(&'a self, id: &'a DocumentId) -> StoreFuture<'a, Option<Row>>;

    /// Counts matching rows, up to the plan's row limit.
    fn count<'a>(&'a self, plan: &'a ReadPlan) -> StoreFuture<'a, CountResult>;

    /// Replaces the document if the row still carries `expected.tx_id`.
    fn compare_and_set<'a>(&'a self, expected: &'a Row, document: Value)
        -> StoreFuture<'a, CasOutcome>;

    /// Deletes the row if it still carries `expected.tx_id`.
    fn compare_and_delete<'a>(&'a self, expected: &'a Row) -> StoreFuture<'a, CasOutcome>;

    /// Writes a new row unless one with the same id exists.
    fn insert_if_absent<'a>(
        &'a self,
        id: &'a DocumentId,
        document: Value,
    ) -> StoreFuture<'a, InsertOutcome>;

    /// Removes every row unconditionally.
    fn truncate(&self) -> StoreFuture<'_, ()>;
}
