//! Household dataset retrieval.
//!
//! This module fetches a region's serialized household table from the
//! dataset store and decodes it into a [`DatasetTable`](crate::models::DatasetTable).

pub mod fetcher;
pub mod format;

pub use fetcher::DatasetFetcher;
pub use format::DatasetFormat;

use thiserror::Error;

/// Failure to decode a downloaded dataset.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported dataset format: {0}")]
    UnknownFormat(String),

    #[error("dataset is missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("dataset columns have different lengths")]
    RaggedColumns,

    #[error("unsupported dataset layout: {0}")]
    UnsupportedLayout(String),

    #[error("dataset is a pandas DataFrame pickle, which cannot be decoded; re-export it as csv or json")]
    PandasPickle,

    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pickle data: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[error("invalid JSON data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure to retrieve a dataset. Always fatal for the current comparison.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Error fetching data from the server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error fetching data from the server: HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Error fetching data from the server: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error fetching data from the server: {0}")]
    Decode(#[from] DecodeError),

    #[error("Error fetching data from the server: decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
