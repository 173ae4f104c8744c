//! Archive Query: resolve free-text questions against a personal message
//! archive: find an attachment, summarize a month of conversation with a
//! contact, or search message text.

pub mod config;
pub mod contact;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fuzzy;
pub mod intent;
pub mod mcp;
pub mod partition;
pub mod stats;
pub mod store;
pub mod summarizer;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::QueryEngine;
use crate::store::SqliteStore;

/// Resolve the archive database path from env var or default location.
pub fn resolve_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARCHIVE_QUERY_DB") {
        return PathBuf::from(path);
    }

    let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.join("archive-query").join("output.db")
}

/// Build an engine from the environment: archive at [`resolve_db_path`],
/// summarizer from `ARCHIVE_QUERY_SUMMARIZER`, config from
/// `ARCHIVE_QUERY_CONFIG`.
///
/// A missing summarizer configuration does not fail startup; summary
/// requests report it instead.
pub fn engine_from_env() -> Result<QueryEngine, Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let summarizer = summarizer::from_env_or_disabled();
    let store = SqliteStore::open(&resolve_db_path())?;
    Ok(QueryEngine::new(Arc::new(store), summarizer, config))
}
