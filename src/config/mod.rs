//! Operations configuration
//!
//! Bounds and defaults used by the planner and the mutation engine. The
//! struct is immutable once loaded and is passed explicitly wherever it is
//! needed.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event, Event, Severity};

/// Operations configuration.
///
/// Every field has a default; a config file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsConfig {
    /// Page size of plain reads (default: 20)
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Page size of sorted reads, wide enough to sort in memory (default: 100)
    #[serde(default = "default_sort_page_size")]
    pub default_sort_page_size: usize,

    /// Max rows buffered by a sorted read (default: 10000)
    #[serde(default = "default_max_document_sort_count")]
    pub max_document_sort_count: usize,

    /// Max rows of a vector similarity read (default: 1000)
    #[serde(default = "default_max_vector_search_limit")]
    pub max_vector_search_limit: usize,

    /// Max rows removed by one deleteMany (default: 20)
    #[serde(default = "default_max_document_delete_count")]
    pub max_document_delete_count: usize,

    /// Max rows changed by one updateMany (default: 20)
    #[serde(default = "default_max_document_update_count")]
    pub max_document_update_count: usize,

    /// Max documents of one insertMany (default: 20)
    #[serde(default = "default_max_document_insert_count")]
    pub max_document_insert_count: usize,

    /// Page size of count reads (default: 100)
    #[serde(default = "default_count_page_size")]
    pub default_count_page_size: usize,

    /// Max rows counted before reporting more data (default: 1000)
    #[serde(default = "default_max_count_limit")]
    pub max_count_limit: usize,

    /// Max length of `$in`/`$nin`/`$all` lists (default: 100)
    #[serde(default = "default_max_in_operator_value_size")]
    pub max_in_operator_value_size: usize,

    /// Compare-and-set retries per row after a conflict (default: 3)
    #[serde(default = "default_lwt_retries")]
    pub lwt_retries: u32,

    /// Rows of one mutation processed concurrently (default: 8)
    #[serde(default = "default_max_concurrent_row_mutations")]
    pub max_concurrent_row_mutations: usize,

    /// Minimum log severity (default: "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_page_size() -> usize {
    20
}
fn default_sort_page_size() -> usize {
    100
}
fn default_max_document_sort_count() -> usize {
    10_000
}
fn default_max_vector_search_limit() -> usize {
    1000
}
fn default_max_document_delete_count() -> usize {
    20
}
fn default_max_document_update_count() -> usize {
    20
}
fn default_max_document_insert_count() -> usize {
    20
}
fn default_count_page_size() -> usize {
    100
}
fn default_max_count_limit() -> usize {
    1000
}
fn default_max_in_operator_value_size() -> usize {
    100
}
fn default_lwt_retries() -> u32 {
    3
}
fn default_max_concurrent_row_mutations() -> usize {
    8
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            default_sort_page_size: default_sort_page_size(),
            max_document_sort_count: default_max_document_sort_count(),
            max_vector_search_limit: default_max_vector_search_limit(),
            max_document_delete_count: default_max_document_delete_count(),
            max_document_update_count: default_max_document_update_count(),
            max_document_insert_count: default_max_document_insert_count(),
            default_count_page_size: default_count_page_size(),
            max_count_limit: default_max_count_limit(),
            max_in_operator_value_size: default_max_in_operator_value_size(),
            lwt_retries: default_lwt_retries(),
            max_concurrent_row_mutations: default_max_concurrent_row_mutations(),
            log_level: default_log_level(),
        }
    }
}

impl OperationsConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = Self::from_json(&content)?;

        let (path_str, retries) = (path.display().to_string(), config.lwt_retries.to_string());
        log_event(
            Event::ConfigLoaded,
            &[("path", path_str.as_str()), ("lwt_retries", retries.as_str())],
        );
        Ok(config)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: OperationsConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate bounds
    pub fn validate(&self) -> ConfigResult<()> {
        let sizes = [
            ("default_page_size", self.default_page_size),
            ("default_sort_page_size", self.default_sort_page_size),
            ("max_document_sort_count", self.max_document_sort_count),
            ("max_vector_search_limit", self.max_vector_search_limit),
            ("max_document_delete_count", self.max_document_delete_count),
            ("max_document_update_count", self.max_document_update_count),
            ("max_document_insert_count", self.max_document_insert_count),
            ("default_count_page_size", self.default_count_page_size),
            ("max_count_limit", self.max_count_limit),
            ("max_in_operator_value_size", self.max_in_operator_value_size),
            ("max_concurrent_row_mutations", self.max_concurrent_row_mutations),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
        }

        if self.default_sort_page_size < self.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_sort_page_size ({}) must be >= default_page_size ({})",
                self.default_sort_page_size, self.default_page_size
            )));
        }

        self.log_severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn log_severity(&self) -> ConfigResult<Severity> {
        Severity::from_name(&self.log_level)
            .ok_or_else(|| ConfigError::Invalid(format!("Unknown log_level '{}'", self.log_level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = OperationsConfig::default();
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.default_sort_page_size, 100);
        assert_eq!(config.max_document_sort_count, 10_000);
        assert_eq!(config.max_vector_search_limit, 1000);
        assert_eq!(config.lwt_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config = OperationsConfig::from_json(r#"{"lwt_retries": 5}"#).unwrap();
        assert_eq!(config.lwt_retries, 5);
        assert_eq!(config.max_document_delete_count, 20);
        assert_eq!(config.log_level, "INFO");
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        let err = OperationsConfig::from_json(r#"{"max_count_limit": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("max_count_limit")));
    }

    #[test]
    fn test_config_rejects_narrow_sort_page() {
        let result = OperationsConfig::from_json(
            r#"{"default_page_size": 50, "default_sort_page_size": 10}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_rejects_unknown_log_level() {
        let result = OperationsConfig::from_json(r#"{"log_level": "LOUD"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docplan.json");
        fs::write(&path, json!({"max_document_delete_count": 7}).to_string()).unwrap();

        let config = OperationsConfig::load(&path).unwrap();
        assert_eq!(config.max_document_delete_count, 7);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = OperationsConfig::load(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docplan.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            OperationsConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
