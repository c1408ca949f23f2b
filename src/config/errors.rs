//! Configuration errors

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File missing or unreadable
    #[error("Failed to read config '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Not valid JSON for the config shape
    #[error("Invalid config JSON: {0}")]
    Parse(String),

    /// Parsed but out of bounds
    #[error("Invalid config: {0}")]
    Invalid(String),
}
