//! Command resolution
//!
//! Routes every command through one `Operation` value:
//!
//! - Find / Count: a read plan
//! - Delete / Update: a read plan wrapped by the mutation orchestrator
//! - Insert: the documents to write
//!
//! Resolution failures are client errors raised before any row is read.

mod errors;
mod model;
mod orchestrator;
mod resolver;

pub use errors::{ResolveError, ResolveResult};
pub use model::{InsertOperation, MutatingOperation, MutationPayload, Operation, ReadOperation};
pub use orchestrator::MutationOrchestrator;
pub use resolver::CommandResolver;
