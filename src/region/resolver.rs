//! Zip code lookup client.
//!
//! Resolves a zip code to its state name through an external zip lookup
//! service. Resolution never fails: lookup problems degrade to a
//! [`Resolution`] variant that still yields a dataset key, so the downstream
//! fetch fails instead of the whole request.

use crate::config::LookupConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Dataset key used when a zip code cannot be resolved.
pub const STATE_NOT_FOUND: &str = "State not found";

/// Outcome of resolving a zip code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The lookup service returned a state.
    Resolved(String),
    /// The lookup succeeded but carried no state.
    NotFound,
    /// The lookup itself failed (transport, status, or body).
    Degraded(String),
}

impl Resolution {
    /// Key under which the region's dataset is stored.
    pub fn dataset_key(&self) -> &str {
        match self {
            Resolution::Resolved(state) => state,
            Resolution::NotFound | Resolution::Degraded(_) => STATE_NOT_FOUND,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Resolved(state) => write!(f, "{}", state),
            Resolution::NotFound => write!(f, "{}", STATE_NOT_FOUND),
            Resolution::Degraded(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// Client for the zip lookup service.
#[derive(Debug, Clone)]
pub struct RegionResolver {
    http_client: reqwest::Client,
    lookup_url: String,
    api_key: Option<String>,
}

impl RegionResolver {
    /// Create a resolver from the lookup settings.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create lookup HTTP client")?;

        if config.api_key.is_none() {
            warn!("No zip lookup API key configured; lookups will likely be rejected");
        }

        Ok(Self {
            http_client,
            lookup_url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Resolve a zip code to a state. Makes a single attempt.
    pub async fn resolve(&self, zip_code: &str) -> Resolution {
        let resolution = match self.lookup(zip_code).await {
            Ok(resolution) => resolution,
            Err(e) => Resolution::Degraded(format!("{:#}", e)),
        };

        match &resolution {
            Resolution::Resolved(state) => debug!("Zip {} resolved to {}", zip_code, state),
            Resolution::NotFound => warn!("No state found for zip {}", zip_code),
            Resolution::Degraded(reason) => {
                warn!("Zip lookup for {} failed: {}", zip_code, reason)
            }
        }

        resolution
    }

    async fn lookup(&self, zip_code: &str) -> Result<Resolution> {
        let mut request = self
            .http_client
            .get(&self.lookup_url)
            .query(&[("zip", zip_code)]);
        if let Some(ref key) = self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.context("Lookup request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(Resolution::Degraded(format!("HTTP {}: {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse lookup response")?;

        Ok(state_from_body(&body))
    }
}

/// Extract the state from a lookup body (a record or a list of records).
fn state_from_body(body: &Value) -> Resolution {
    let record = match body {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    record
        .and_then(|r| r.get("state"))
        .and_then(Value::as_str)
        .map(|state| Resolution::Resolved(state.to_string()))
        .unwrap_or(Resolution::NotFound)
}
