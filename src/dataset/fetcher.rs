//! Dataset store client.
//!
//! Downloads `<base>/<state>/<zip>_household.<ext>`, spools the body through
//! a scoped temporary file and decodes it. The temporary file is removed when
//! it goes out of scope, whether decoding succeeds, fails, or the request is
//! cancelled.

use super::{DatasetFormat, FetchError};
use crate::config::DatasetConfig;
use crate::models::DatasetTable;
use anyhow::{Context, Result};
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches household datasets over HTTP.
#[derive(Debug, Clone)]
pub struct DatasetFetcher {
    http_client: reqwest::Client,
    base_url: String,
    format: DatasetFormat,
}

impl DatasetFetcher {
    /// Create a fetcher from the dataset settings.
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        let format = DatasetFormat::from_extension(&config.extension)
            .with_context(|| format!("Invalid dataset extension: {}", config.extension))?;
        if format == DatasetFormat::Pickle {
            warn!("Pickle datasets must hold plain records or columns; pandas DataFrame pickles are rejected");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create dataset HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            format,
        })
    }

    /// URL of the household dataset for a zip code within a state.
    pub fn dataset_url(&self, state: &str, zip_code: &str) -> String {
        format!(
            "{}/{}/{}_household.{}",
            self.base_url,
            state,
            zip_code,
            self.format.extension()
        )
    }

    /// Download and decode one region's dataset. Makes a single attempt.
    pub async fn fetch(&self, state: &str, zip_code: &str) -> Result<DatasetTable, FetchError> {
        let url = self.dataset_url(state, zip_code);
        debug!("Fetching dataset: {}", url);

        let response = self.http_client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status, url });
        }

        let body = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", body.len(), url);

        let format = self.format;
        let table = tokio::task::spawn_blocking(move || decode_spooled(format, &body)).await??;

        if table.is_empty() {
            warn!("Dataset for zip {} has no households", zip_code);
        } else {
            info!("Loaded {} households for zip {}", table.len(), zip_code);
        }
        Ok(table)
    }
}

/// Write the body to a temporary file and decode it back.
fn decode_spooled(format: DatasetFormat, body: &[u8]) -> Result<DatasetTable, FetchError> {
    decode_spooled_in(&std::env::temp_dir(), format, body)
}

fn decode_spooled_in(
    dir: &Path,
    format: DatasetFormat,
    body: &[u8],
) -> Result<DatasetTable, FetchError> {
    let mut spool = tempfile::Builder::new()
        .prefix("household-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(dir)?;

    spool.write_all(body)?;
    spool.flush()?;

    let reader = BufReader::new(spool.reopen()?);
    let table = format.decode(reader)?;

    // `spool` is unlinked on drop.
    Ok(table)
}
