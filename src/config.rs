//! Engine configuration.
//!
//! Every field has a default, so an optional JSON file only needs the
//! values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::intent::{DEFAULT_PDF_KEYWORDS, DEFAULT_SUMMARIZE_KEYWORDS, IntentClassifier};

/// Tunables for classification, resolution and partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pdf_keywords: Vec<String>,
    pub summarize_keywords: Vec<String>,
    /// Attachment matches must score strictly above this.
    pub attachment_cutoff: f64,
    /// Contact matches must score strictly above this.
    pub contact_cutoff: f64,
    /// Message search hits must score strictly above this.
    pub message_cutoff: f64,
    /// Maximum number of message search hits returned.
    pub message_top_k: usize,
    /// Windows with fewer lines are dropped.
    pub min_window_lines: usize,
    /// Maximum near-miss suggestions returned with a failure.
    pub suggestion_limit: usize,
    /// SQL `LIKE` pattern selecting candidate attachments.
    pub attachment_pattern: String,
    /// Label incoming lines with the contact's name instead of "Them".
    pub name_incoming_speaker: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pdf_keywords: DEFAULT_PDF_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            summarize_keywords: DEFAULT_SUMMARIZE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            attachment_cutoff: 40.0,
            contact_cutoff: 60.0,
            message_cutoff: 60.0,
            message_top_k: 5,
            min_window_lines: 3,
            suggestion_limit: 5,
            attachment_pattern: "%.pdf".to_string(),
            name_incoming_speaker: true,
        }
    }
}

impl EngineConfig {
    /// Load overrides from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        // A window must hold at least one line.
        config.min_window_lines = config.min_window_lines.max(1);
        Ok(config)
    }

    /// Load from `ARCHIVE_QUERY_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("ARCHIVE_QUERY_CONFIG") {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn classifier(&self) -> IntentClassifier {
        IntentClassifier::new(self.pdf_keywords.clone(), self.summarize_keywords.clone())
    }
}
