//! Planning and command validation errors
//!
//! Error codes:
//! - DOC_SORT_CONFLICTING (REJECT)
//! - DOC_SORT_INVALID (REJECT)
//! - DOC_VECTORIZE_UNRESOLVED (REJECT)
//! - DOC_COMMAND_INVALID_OPTION (REJECT)
//! - DOC_COMMAND_INVALID (REJECT)
//!
//! Raised before any row is read; never retried.

use std::fmt;

use crate::filter::Severity;

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Vector sort combined with a field sort, or two vector sorts
    ConflictingSortSpecification,
    /// Malformed sort clause, or a sort on a command that takes none
    InvalidSort,
    /// `$vectorize` text reached planning without an embedding
    VectorizeUnresolved,
    /// Option unknown, not applicable to the command, or out of range
    InvalidCommandOption,
    /// Malformed command
    InvalidCommand,
}

impl PlannerErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::ConflictingSortSpecification => "DOC_SORT_CONFLICTING",
            PlannerErrorCode::InvalidSort => "DOC_SORT_INVALID",
            PlannerErrorCode::VectorizeUnresolved => "DOC_VECTORIZE_UNRESOLVED",
            PlannerErrorCode::InvalidCommandOption => "DOC_COMMAND_INVALID_OPTION",
            PlannerErrorCode::InvalidCommand => "DOC_COMMAND_INVALID",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    field: Option<String>,
}

impl PlannerError {
    /// Vector and field sort in the same command
    pub fn conflicting_sort(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::ConflictingSortSpecification,
            message: reason.into(),
            field: None,
        }
    }

    /// Malformed sort clause
    pub fn invalid_sort(field: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::InvalidSort,
            message: reason.into(),
            field: field.map(str::to_string),
        }
    }

    /// `$vectorize` left unresolved
    pub fn vectorize_unresolved(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::VectorizeUnresolved,
            message: reason.into(),
            field: Some("$vectorize".to_string()),
        }
    }

    /// Bad command option
    pub fn invalid_option(option: &str, reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::InvalidCommandOption,
            message: format!("Option '{}': {}", option, reason.into()),
            field: Some(option.to_string()),
        }
    }

    /// Malformed command
    pub fn invalid_command(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::InvalidCommand,
            message: reason.into(),
            field: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the field or option name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
