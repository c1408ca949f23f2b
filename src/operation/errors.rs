//! Command resolution errors

use thiserror::Error;

use crate::filter::FilterError;
use crate::planner::PlannerError;

/// Failure to turn a command into an operation.
///
/// Always a client error: nothing has been read or written yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Planner(#[from] PlannerError),
}

impl ResolveError {
    /// Stable string code of the underlying error
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::Filter(e) => e.code().code(),
            ResolveError::Planner(e) => e.code().code(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResolveError::Filter(e) => e.message(),
            ResolveError::Planner(e) => e.message(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        true
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
