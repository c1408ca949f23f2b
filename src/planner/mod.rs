//! Query planner
//!
//! Turns a compiled filter plus the command's sort, arity and options into
//! a read plan: page size, row limit, read shape, ordering and vector mode.
//!
//! # Design Principles
//!
//! - Deterministic: same inputs → same plan
//! - Pure: configuration is passed in, never read from ambient state
//! - Explicit: conflicting or unresolved sorts are rejected, never guessed

mod errors;
mod explain;
mod plan;
mod planner;

pub use errors::{PlannerError, PlannerErrorCode, PlannerResult};
pub use explain::{ExplainPlan, MutationExplain};
pub use plan::{ReadPlan, ReadShape, UNBOUNDED};
pub use planner::QueryPlanner;
