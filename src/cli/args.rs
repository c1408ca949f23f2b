//! CLI argument definitions using clap
//!
//! Commands:
//! - docplan explain [--config <path>] [--format text|json]
//! - docplan check-config --config <path>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// docplan - plan document commands against a wide-column store
#[derive(Parser, Debug)]
#[command(name = "docplan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a JSON command from stdin and print its plan
    Explain {
        /// Operations configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate an operations configuration file and print the effective values
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./docplan.json")]
        config: PathBuf,
    },
}

/// Explain output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
