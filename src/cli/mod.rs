//! CLI module for docplan
//!
//! Provides command-line interface for:
//! - explain: Plan one JSON command read from stdin
//! - check-config: Validate an operations configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, OutputFormat};
pub use commands::{check_config, explain, explain_request, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_response, write_text};
