//! Dotted field paths

use std::fmt;

use thiserror::Error;

/// Field path validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Field path must not be empty")]
    Empty,

    #[error("Field path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("Field path '{0}' must not start with '$'")]
    OperatorPrefix(String),
}

/// Dot-separated path to a (possibly nested) document field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(String);

impl FieldPath {
    /// Parses and validates a path.
    pub fn parse(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.starts_with('$') {
            return Err(PathError::OperatorPrefix(path));
        }
        if path.split('.').any(str::is_empty) {
            return Err(PathError::EmptySegment(path));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// True if this path names a top-level field
    pub fn is_top_level(&self) -> bool {
        !self.0.contains('.')
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
