//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.zipcompare.toml` files. Credentials are injected here (or via CLI /
//! environment) and are never compiled into the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".zipcompare.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server settings (shared by both transports).
    #[serde(default)]
    pub server: ServerConfig,

    /// Zip lookup service settings.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Dataset store settings.
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// MCP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported during `initialize`.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Bind host for the SSE transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port for the SSE transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_server_name() -> String {
    "compare-zipcodes".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Zip lookup service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Lookup endpoint; the zip is passed as the `zip` query parameter.
    #[serde(default = "default_lookup_url")]
    pub url: String,

    /// Value for the `X-Api-Key` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            url: default_lookup_url(),
            api_key: None,
        }
    }
}

fn default_lookup_url() -> String {
    "https://api.api-ninjas.com/v1/zipcode".to_string()
}

/// Dataset store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Base URL; datasets live at `<base_url>/<state>/<zip>_household.<extension>`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Dataset file extension (`csv`, `json` or `pkl`).
    ///
    /// `pkl` only reads pickled record lists or column dicts, not pandas
    /// DataFrames.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            extension: default_extension(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://web.media.mit.edu/~almurph/censusdata/output_v2/household".to_string()
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref key) = args.api_key {
            self.lookup.api_key = Some(key.clone());
        }
        if let Some(ref url) = args.data_url {
            self.dataset.base_url = url.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
