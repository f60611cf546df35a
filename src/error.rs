use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure reported by a [`crate::source::DataSource`] adapter.
///
/// The cache treats every variant the same way (a failed refresh); the
/// distinction only matters for logging.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Opening source file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Reading CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Failed to decode text with encoding {encoding}")]
    Decode { encoding: &'static str },
    #[error("Invalid source URL '{0}'")]
    InvalidUrl(String),
}

/// Reasons a refresh attempt did not produce a replacement dataset.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("Source returned no data rows")]
    EmptyResponse,
    #[error("No identifier or locality column could be resolved from headers {headers:?}")]
    SchemaUnresolved { headers: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Opening config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Parsing config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("No data source configured; pass --source, --sheet-id or set `source` in the config file")]
    MissingSource,
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
    #[error("Invalid delimiter '{value}': {reason}")]
    InvalidDelimiter { value: String, reason: String },
    #[error(transparent)]
    InvalidSource(#[from] SourceError),
}
