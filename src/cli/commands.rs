//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use crate::config::OperationsConfig;
use crate::observability::{Logger, MetricsRegistry};
use crate::operation::CommandResolver;
use crate::planner::ExplainPlan;
use crate::value::JsonIdentity;

use super::args::{Command, OutputFormat};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response, write_text};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Explain { config, format } => explain(config.as_deref(), format),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Explain the command read from stdin
///
/// Writes the explain in either format; a rejected command still prints its
/// explain and then fails.
pub fn explain(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = read_request()?;

    let explain = explain_request(&config, &request);
    match format {
        OutputFormat::Text => write_text(&explain.to_string())?,
        OutputFormat::Json => write_response(serde_json::to_value(&explain)?)?,
    }

    match (&explain.rejection_code, &explain.rejection_reason) {
        (Some(code), Some(reason)) => Err(CliError::rejected(code, reason)),
        _ => Ok(()),
    }
}

/// Explain of one JSON request under the given configuration
pub fn explain_request(config: &OperationsConfig, request: &str) -> ExplainPlan {
    CommandResolver::new(config, &JsonIdentity, Arc::new(MetricsRegistry::new()))
        .explain_request(request)
}

/// Validate a configuration file and print the effective values
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(Some(config_path))?;
    write_response(serde_json::to_value(&config)?)
}

fn load_config(path: Option<&Path>) -> CliResult<OperationsConfig> {
    let config = match path {
        Some(path) => OperationsConfig::load(path)?,
        None => OperationsConfig::default(),
    };
    Logger::set_min_severity(config.log_severity()?);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explain_request_uses_config() {
        let config = OperationsConfig {
            max_document_delete_count: 5,
            ..Default::default()
        };
        let explain = explain_request(&config, r#"{"deleteMany": {"filter": {"a": 1}}}"#);
        assert!(explain.accepted);
        assert_eq!(explain.row_limit, Some(6));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docplan.json");
        fs::write(&path, r#"{"default_page_size": 7, "log_level": "warn"}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_page_size, 7);
    }

    #[test]
    fn test_check_config_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docplan.json");
        fs::write(&path, r#"{"default_page_size": 0}"#).unwrap();

        let err = check_config(&path).unwrap_err();
        assert_eq!(err.code(), &crate::cli::CliErrorCode::ConfigError);
    }
}
