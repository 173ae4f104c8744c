//! Query orchestration.
//!
//! [`QueryEngine::handle`] classifies a query and runs exactly one branch:
//! summarize when the `summarize` label is present, otherwise document
//! lookup when `pdf` is present, otherwise message search. A failing branch
//! reports its own outcome and never falls through to another.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::contact::{Contact, HandleId, resolve_contact};
use crate::error::StoreError;
use crate::extract::{
    clean_attachment_query, clean_message_query, extract_contact_fragment, extract_period,
};
use crate::fuzzy;
use crate::intent::{Intent, IntentClassifier};
use crate::partition::{
    ANONYMOUS_SPEAKER, SelectionError, YearMonth, available_periods, partition, select_window,
};
use crate::stats::MessageStats;
use crate::store::MessageStore;
use crate::summarizer::{Summarizer, system_prompt};

/// Default number of entries returned by [`QueryEngine::recent_conversations`].
pub const DEFAULT_RECENT_LIMIT: usize = 20;

// ============================================================================
// Results
// ============================================================================

/// Result of handling one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    PdfFound {
        filename: String,
        /// Path with the home placeholder expanded.
        path: String,
        score: f64,
    },
    PdfNotFound {
        query: String,
        /// Closest filenames, best first.
        suggestions: Vec<String>,
    },
    SummaryFound {
        contact_name: String,
        period: YearMonth,
        text: String,
    },
    SummaryError {
        reason: SummaryFailure,
    },
    MessageSearchResults {
        query: String,
        lines: Vec<SearchLine>,
    },
    /// The store could not be read; nothing else was attempted.
    StoreUnavailable {
        reason: String,
    },
    EmptyQuery,
}

/// Why a summarize request produced no summary.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryFailure {
    #[error("Couldn't tell whose conversation to summarize. Try \"summarize with <name>\".")]
    MissingContactName,

    #[error("No contact found matching '{fragment}'.")]
    ContactNotFound { fragment: String },

    #[error("No conversations with {contact_name} are long enough to summarize.")]
    NoConversations { contact_name: String },

    #[error(
        "No conversation with {contact_name} for {requested}. Available: {}",
        join_periods(.available)
    )]
    NoConversationForPeriod {
        contact_name: String,
        requested: YearMonth,
        available: Vec<YearMonth>,
    },

    #[error("Summarizer failed: {message}")]
    Summarizer { message: String },
}

fn join_periods(periods: &[YearMonth]) -> String {
    periods
        .iter()
        .map(YearMonth::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One message search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchLine {
    pub date: NaiveDate,
    pub text: String,
    pub score: f64,
}

impl SearchLine {
    /// "YYYY-MM-DD: text"
    pub fn render(&self) -> String {
        format!("{}: {}", self.date.format("%Y-%m-%d"), self.text)
    }
}

impl Outcome {
    /// Human-readable reply for this outcome.
    pub fn content(&self) -> String {
        match self {
            Self::PdfFound { filename, .. } => format!("I found a file: {filename}"),
            Self::PdfNotFound { suggestions, .. } if suggestions.is_empty() => {
                "No PDF file found for your query.".to_string()
            }
            Self::PdfNotFound { suggestions, .. } => format!(
                "No PDF file found for your query. Closest files: {}",
                suggestions.join(", ")
            ),
            Self::SummaryFound { text, .. } => text.clone(),
            Self::SummaryError { reason } => reason.to_string(),
            Self::MessageSearchResults { lines, .. } if lines.is_empty() => {
                "No matching messages found.".to_string()
            }
            Self::MessageSearchResults { lines, .. } => lines
                .iter()
                .map(SearchLine::render)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Self::StoreUnavailable { reason } => {
                format!("The message archive is unavailable: {reason}")
            }
            Self::EmptyQuery => "Please enter a query.".to_string(),
        }
    }
}

/// Latest exchange with one contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentConversation {
    pub contact: String,
    pub last_message: String,
    /// "You" for outgoing messages, the contact otherwise.
    pub sender: String,
    pub timestamp: NaiveDateTime,
}

/// Summarizable months for a resolved contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPeriods {
    pub contact_name: String,
    pub score: f64,
    pub periods: Vec<PeriodInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodInfo {
    pub period: YearMonth,
    pub lines: usize,
}

/// Message frequency counts for a resolved contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactStats {
    pub contact_name: String,
    pub score: f64,
    #[serde(flatten)]
    pub stats: MessageStats,
}

// ============================================================================
// Engine
// ============================================================================

/// Stateless per-request orchestrator over a store and a summarizer.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn MessageStore>,
    summarizer: Arc<dyn Summarizer>,
    classifier: IntentClassifier,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn MessageStore>,
        summarizer: Arc<dyn Summarizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            summarizer,
            classifier: config.classifier(),
            config,
        }
    }

    /// Handle a query relative to the local current date.
    pub async fn handle(&self, query: &str) -> Outcome {
        self.handle_on(query, Local::now().date_naive()).await
    }

    /// Handle a query, resolving relative periods against `today`.
    pub async fn handle_on(&self, query: &str, today: NaiveDate) -> Outcome {
        if query.trim().is_empty() {
            return Outcome::EmptyQuery;
        }

        let intents = self.classifier.classify(query);
        info!(?intents, "classified query");

        let result = if intents.contains(&Intent::Summarize) {
            self.summarize(query, today).await
        } else if intents.contains(&Intent::Pdf) {
            self.find_attachment(query).await
        } else {
            self.search_messages(query).await
        };

        result.unwrap_or_else(|e| {
            warn!("store read failed: {e}");
            Outcome::StoreUnavailable {
                reason: e.to_string(),
            }
        })
    }

    async fn summarize(&self, query: &str, today: NaiveDate) -> Result<Outcome, StoreError> {
        let fail = |reason| Ok(Outcome::SummaryError { reason });

        let Some(fragment) = extract_contact_fragment(query) else {
            return fail(SummaryFailure::MissingContactName);
        };
        let period = extract_period(query, today);
        debug!(fragment = %fragment, %period, "summary request");

        let contacts = self.store.list_contacts().await?;
        let Some(found) = resolve_contact(&fragment, &contacts, self.config.contact_cutoff) else {
            return fail(SummaryFailure::ContactNotFound { fragment });
        };
        let contact = found.entity;
        let contact_name = contact.display_name();

        let messages = self.store.list_messages(&contact.handle_ids).await?;
        let speaker = if self.config.name_incoming_speaker {
            contact_name.as_str()
        } else {
            ANONYMOUS_SPEAKER
        };
        let windows = partition(&messages, contact.id, speaker, self.config.min_window_lines);
        info!(
            contact = contact.id,
            messages = messages.len(),
            windows = windows.len(),
            "partitioned conversation"
        );

        let window = match select_window(
            &windows,
            period.resolve(today),
            self.config.suggestion_limit,
        ) {
            Ok(window) => window,
            Err(SelectionError::NoConversations) => {
                return fail(SummaryFailure::NoConversations { contact_name });
            }
            Err(SelectionError::PeriodUnavailable {
                requested,
                available,
            }) => {
                return fail(SummaryFailure::NoConversationForPeriod {
                    contact_name,
                    requested,
                    available,
                });
            }
        };

        let system = system_prompt(&contact_name, &window.period.label());
        match self.summarizer.summarize(&system, &window.text()).await {
            Ok(text) => Ok(Outcome::SummaryFound {
                contact_name,
                period: window.period,
                text,
            }),
            Err(e) => {
                warn!("summarizer failed: {e}");
                fail(SummaryFailure::Summarizer {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn find_attachment(&self, query: &str) -> Result<Outcome, StoreError> {
        let cleaned = clean_attachment_query(query);
        let attachments = self
            .store
            .list_attachments(&self.config.attachment_pattern)
            .await?;
        let stems: Vec<String> = attachments.iter().map(|a| file_stem(&a.filename)).collect();

        if let Some(best) = fuzzy::best_match(&cleaned, &stems) {
            let attachment = &attachments[best.index];
            if best.score > self.config.attachment_cutoff {
                info!(filename = %attachment.filename, score = best.score, "attachment match");
                return Ok(Outcome::PdfFound {
                    filename: attachment.filename.clone(),
                    path: attachment.resolved_path().display().to_string(),
                    score: best.score,
                });
            }
            debug!(
                near_miss = %attachment.filename,
                score = best.score,
                cutoff = self.config.attachment_cutoff,
                "no attachment above cutoff"
            );
        }

        let limit = self.config.suggestion_limit;
        let ranked = fuzzy::top_matches(&cleaned, &stems, limit, f64::MIN);
        let suggestions = if ranked.is_empty() {
            attachments
                .iter()
                .take(limit)
                .map(|a| a.filename.clone())
                .collect()
        } else {
            ranked
                .iter()
                .map(|m| attachments[m.index].filename.clone())
                .collect()
        };

        Ok(Outcome::PdfNotFound {
            query: cleaned,
            suggestions,
        })
    }

    async fn search_messages(&self, query: &str) -> Result<Outcome, StoreError> {
        let cleaned = clean_message_query(query);
        if cleaned.is_empty() {
            return Ok(Outcome::EmptyQuery);
        }

        let messages = self.store.list_text_messages().await?;
        let bodies: Vec<String> = messages.iter().map(|m| m.text.to_lowercase()).collect();
        let hits = fuzzy::top_matches(
            &cleaned,
            &bodies,
            self.config.message_top_k,
            self.config.message_cutoff,
        );
        info!(candidates = messages.len(), hits = hits.len(), "message search");

        let lines = hits
            .into_iter()
            .map(|hit| {
                let message = &messages[hit.index];
                SearchLine {
                    date: message.timestamp.date(),
                    text: message.text.clone(),
                    score: hit.score,
                }
            })
            .collect();

        Ok(Outcome::MessageSearchResults {
            query: cleaned,
            lines,
        })
    }

    /// Latest message per contact, newest first.
    ///
    /// Handles without a contact are listed under the raw handle id. With a
    /// `filter`, only entries whose contact or last message contains it
    /// (case-insensitively) are kept.
    pub async fn recent_conversations(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RecentConversation>, StoreError> {
        let contacts = self.store.list_contacts().await?;
        let latest = self.store.latest_per_handle().await?;

        let owners: HashMap<HandleId, &Contact> = contacts
            .iter()
            .flat_map(|c| c.handle_ids.iter().map(move |h| (*h, c)))
            .collect();
        let filter = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());

        let mut seen: HashSet<String> = HashSet::new();
        let mut recent = Vec::new();
        for message in latest {
            if recent.len() >= limit {
                break;
            }
            let (key, name) = match owners.get(&message.handle_id) {
                Some(contact) => (format!("contact:{}", contact.id), contact.display_name()),
                None => {
                    let handle = message.handle_id.to_string();
                    (format!("handle:{handle}"), handle)
                }
            };
            // A contact with several handles keeps only its newest message.
            if !seen.insert(key) {
                continue;
            }

            let last_message = if message.text.trim().is_empty() {
                "[No Text]".to_string()
            } else {
                message.text.clone()
            };
            if let Some(ref f) = filter {
                let hit =
                    name.to_lowercase().contains(f) || last_message.to_lowercase().contains(f);
                if !hit {
                    continue;
                }
            }

            let sender = if message.is_outgoing {
                "You".to_string()
            } else {
                name.clone()
            };
            recent.push(RecentConversation {
                contact: name,
                last_message,
                sender,
                timestamp: message.timestamp,
            });
        }

        Ok(recent)
    }

    /// Resolve `contact_name` and list its summarizable months, most recent
    /// first. `None` when no contact matches.
    pub async fn conversation_periods(
        &self,
        contact_name: &str,
    ) -> Result<Option<ContactPeriods>, StoreError> {
        let contacts = self.store.list_contacts().await?;
        let Some(found) = resolve_contact(contact_name, &contacts, self.config.contact_cutoff)
        else {
            return Ok(None);
        };

        let contact = found.entity;
        let messages = self.store.list_messages(&contact.handle_ids).await?;
        let windows = partition(
            &messages,
            contact.id,
            ANONYMOUS_SPEAKER,
            self.config.min_window_lines,
        );
        let periods = available_periods(&windows, usize::MAX)
            .into_iter()
            .map(|period| PeriodInfo {
                period,
                lines: windows[&period].lines.len(),
            })
            .collect();

        Ok(Some(ContactPeriods {
            contact_name: contact.display_name(),
            score: found.score,
            periods,
        }))
    }

    /// Resolve `contact_name` and count its messages by year, month and
    /// hour across all of its handles. `None` when no contact matches.
    pub async fn message_stats(
        &self,
        contact_name: &str,
    ) -> Result<Option<ContactStats>, StoreError> {
        let contacts = self.store.list_contacts().await?;
        let Some(found) = resolve_contact(contact_name, &contacts, self.config.contact_cutoff)
        else {
            return Ok(None);
        };

        let contact = found.entity;
        let messages = self.store.list_messages(&contact.handle_ids).await?;
        let stats = MessageStats::from_messages(&messages);
        info!(contact = contact.id, total = stats.total, "message stats");

        Ok(Some(ContactStats {
            contact_name: contact.display_name(),
            score: found.score,
            stats,
        }))
    }
}

fn file_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| filename.to_lowercase())
}

// ============================================================================
// Tests
// ============================================================================
