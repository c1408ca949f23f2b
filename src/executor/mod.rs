//! Operation executor
//!
//! Consumes resolved operations and drives a `RowStore`.
//!
//! # Mutation flow
//!
//! 1. Bulk clear when the operation selected the fast path
//! 2. Otherwise page through the read plan, up to `mutation_limit + 1` rows
//! 3. Per row, concurrently: CAS on the read-time version, fresh re-read and
//!    retry on conflict, up to `retry_limit` retries
//! 4. Upsert when nothing matched and the operation asks for it
//! 5. Collect one outcome per started row, in read order
//!
//! # Invariants
//!
//! - A row is reported exactly once
//! - A retry always follows a fresh read
//! - Store failures fail the operation; row conflicts do not

mod errors;
mod executor;
mod memory;
mod mutation;
mod mutator;
mod result;
mod sorter;
mod store;

pub use errors::{ExecutorError, ExecutorResult};
pub use executor::{OperationExecutor, OperationOutput};
pub use memory::MemoryRowStore;
pub use mutation::{CancellationFlag, MutationExecutor};
pub use mutator::{DocumentMutator, MutationError, Replacement};
pub use result::{
    FindResult, InsertFailure, InsertResult, MutationResult, RowFailure, RowOutcome, RowStatus,
};
pub use sorter::{cosine_similarity, RowSorter};
pub use store::{
    CasOutcome, CountResult, InsertOutcome, Page, PagingState, Row, RowStore, StoreFuture,
};
