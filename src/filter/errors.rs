//! Filter compilation errors
//!
//! Error codes:
//! - DOC_FILTER_UNSUPPORTED_OPERATOR (REJECT)
//! - DOC_FILTER_INVALID_OPERAND (REJECT)
//! - DOC_FILTER_INVALID_EXPRESSION (REJECT)
//!
//! All filter errors are request-validation failures: they are raised before
//! any row is read and are never retried.

use std::fmt;

/// Severity levels for request-validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Filter-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorCode {
    /// Operator key not recognized (or not allowed on this field)
    UnsupportedFilterOperator,
    /// Operand type incompatible with its operator
    InvalidFilterOperand,
    /// Malformed clause structure
    InvalidFilterExpression,
}

impl FilterErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            FilterErrorCode::UnsupportedFilterOperator => "DOC_FILTER_UNSUPPORTED_OPERATOR",
            FilterErrorCode::InvalidFilterOperand => "DOC_FILTER_INVALID_OPERAND",
            FilterErrorCode::InvalidFilterExpression => "DOC_FILTER_INVALID_EXPRESSION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for FilterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Filter error type with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    code: FilterErrorCode,
    message: String,
    field: Option<String>,
}

impl FilterError {
    /// Unrecognized operator key
    pub fn unsupported_operator(field: Option<&str>, operator: &str) -> Self {
        let message = match field {
            Some(f) => format!("Unsupported filter operator '{}' on field '{}'", operator, f),
            None => format!("Unsupported filter operator '{}'", operator),
        };
        Self {
            code: FilterErrorCode::UnsupportedFilterOperator,
            message,
            field: field.map(str::to_string),
        }
    }

    /// Operand incompatible with the operator
    pub fn invalid_operand(field: &str, reason: impl Into<String>) -> Self {
        Self {
            code: FilterErrorCode::InvalidFilterOperand,
            message: format!("Invalid operand for '{}': {}", field, reason.into()),
            field: Some(field.to_string()),
        }
    }

    /// Malformed filter clause
    pub fn invalid_expression(reason: impl Into<String>) -> Self {
        Self {
            code: FilterErrorCode::InvalidFilterExpression,
            message: reason.into(),
            field: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> FilterErrorCode {
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

    /// Returns the field name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for FilterError {
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

impl std::error::Error for FilterError {}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;
