//! Error types for the archive-query crate.

use thiserror::Error;

/// Errors raised by a message store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is missing or cannot be opened.
    #[error("Message store unavailable: {0}")]
    Unavailable(String),
    /// A read against an open store failed.
    #[error("Message store query failed: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// Errors raised while loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
