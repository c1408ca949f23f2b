//! Filter compilation
//!
//! Turns the filter clause of a command into an immutable expression tree:
//!
//! - `Predicate`: one typed comparison on one field
//! - `Expression`: AND/OR tree of predicate leaves
//! - `FilterCompiler`: clause → tree, validating operators and operands
//! - `ExpressionMatcher`: evaluates a tree against a JSON document
//! - `lower`: maps a predicate to a condition on the shredded columns
//!
//! Compilation is pure and synchronous. A compiled tree is a value object
//! and may be shared read-only across tasks.

mod compiler;
mod errors;
mod expression;
mod lowering;
mod matcher;
mod predicate;

pub use compiler::FilterCompiler;
pub use errors::{FilterError, FilterErrorCode, FilterResult, Severity};
pub use expression::{Expression, LogicalOperator};
pub use lowering::{lower, lower_all, Column, Relation, StoreCondition};
pub use matcher::{resolve_path, ExpressionMatcher};
pub use predicate::{reconcile_identity, Operator, Predicate};

pub(crate) use matcher::date_millis;
