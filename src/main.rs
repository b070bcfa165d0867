//! zipcompare - household demographic comparison over MCP
//!
//! An MCP server exposing one tool, `compare_regions(a, b)`, which fetches
//! synthetic census household data for two zip codes and reports the
//! demographic groups whose counts differ significantly.
//!
//! Exit codes:
//!   0 - Clean shutdown (stdin closed / server stopped)
//!   1 - Runtime error (bad arguments, config, bind failure, etc.)

mod analysis;
mod cli;
mod compare;
mod config;
mod dataset;
mod mcp;
mod models;
mod region;

use anyhow::{Context, Result};
use cli::{Args, Transport};
use compare::RegionComparator;
use config::{Config, DEFAULT_CONFIG_FILE};
use mcp::McpHandler;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("zipcompare v{}", env!("CARGO_PKG_VERSION"));
    debug!("Transport: {:?}", args.transport);

    if let Err(e) = run_server(args).await {
        error!("Server failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .zipcompare.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    // stdout is free here: no transport is running.
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("Set [lookup] api_key (or ZIPCOMPARE_API_KEY) before serving.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs always go to stderr; stdout belongs to the stdio transport.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Build the comparison service and serve it on the selected transport.
async fn run_server(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let comparator = RegionComparator::from_config(&config)?;
    let handler = McpHandler::new(comparator, config.server.name.clone());

    match args.transport {
        Transport::Stdio => mcp::stdio::run(handler).await,
        Transport::Sse => mcp::sse::run(handler, &config.server.host, config.server.port).await,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
