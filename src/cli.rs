//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// zipcompare - compare household demographics of two zip codes
///
/// Runs an MCP server exposing the `compare_regions` tool, which reports
/// demographic groups whose household counts differ significantly
/// between two zip codes.
///
/// Examples:
///   zipcompare                       # stdio transport
///   zipcompare --transport sse --port 8080
///   zipcompare --api-key "$KEY" --config ./census.toml
///   zipcompare --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Transport used to serve the MCP protocol
    #[arg(short, long, default_value = "stdio", value_name = "TRANSPORT")]
    pub transport: Transport,

    /// Bind host for the SSE transport (overrides config)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Bind port for the SSE transport (overrides config)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .zipcompare.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// API key for the zip lookup service
    #[arg(long, value_name = "KEY", env = "ZIPCOMPARE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the household dataset store (overrides config)
    #[arg(long, value_name = "URL")]
    pub data_url: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .zipcompare.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// MCP transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Transport {
    /// JSON-RPC over stdin/stdout (default)
    #[default]
    Stdio,
    /// HTTP server with an event stream and message endpoint
    Sse,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(ref url) = self.data_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Data URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref key) = self.api_key {
            if key.trim().is_empty() {
                return Err("API key must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
