//! Keyword-based intent classification.
//!
//! A query is lower-cased and trimmed, then checked for keyword substrings.
//! `pdf` and `summarize` are independent labels; `message` is the fallback
//! when neither fires and never appears alongside them.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Default keywords that mark a document lookup.
pub const DEFAULT_PDF_KEYWORDS: &[&str] = &["pdf", "document", "file", "attachment"];

/// Default keywords that mark a summarization request.
pub const DEFAULT_SUMMARIZE_KEYWORDS: &[&str] = &["summarize", "summary", "tldr", "recap"];

/// What the user wants done with their query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Pdf,
    Summarize,
    Message,
}

/// Ordered set of labels produced by [`IntentClassifier::classify`].
pub type IntentSet = IndexSet<Intent>;

/// Classifier holding two immutable keyword lists.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    pdf_keywords: Vec<String>,
    summarize_keywords: Vec<String>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PDF_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SUMMARIZE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl IntentClassifier {
    /// Build a classifier. Keywords are lower-cased; blank ones are dropped
    /// since an empty needle would match every query.
    pub fn new(pdf_keywords: Vec<String>, summarize_keywords: Vec<String>) -> Self {
        Self {
            pdf_keywords: normalize_keywords(pdf_keywords),
            summarize_keywords: normalize_keywords(summarize_keywords),
        }
    }

    /// Map raw query text to its intent labels.
    ///
    /// Matching is plain substring containment, so "filed" triggers "file".
    pub fn classify(&self, query: &str) -> IntentSet {
        let query = query.trim().to_lowercase();
        let mut labels = IntentSet::new();

        if contains_any(&query, &self.pdf_keywords) {
            labels.insert(Intent::Pdf);
        }
        if contains_any(&query, &self.summarize_keywords) {
            labels.insert(Intent::Summarize);
        }
        if labels.is_empty() {
            labels.insert(Intent::Message);
        }

        labels
    }
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(query: &str) -> Vec<Intent> {
        IntentClassifier::default()
            .classify(query)
            .into_iter()
            .collect()
    }

    #[test]
    fn test_pdf_only() {
        assert_eq!(labels("find me the biology notecard pdf"), vec![Intent::Pdf]);
        assert_eq!(labels("Open that DOCUMENT"), vec![Intent::Pdf]);
    }

    #[test]
    fn test_summarize_only() {
        assert_eq!(
            labels("summarize my conversation with Jane Doe last month"),
            vec![Intent::Summarize]
        );
        assert_eq!(labels("tldr of chats with bob"), vec![Intent::Summarize]);
    }

    #[test]
    fn test_both_labels_keep_order() {
        assert_eq!(
            labels("give me a summary of the attachment"),
            vec![Intent::Pdf, Intent::Summarize]
        );
        assert_eq!(
            labels("recap, then find the pdf"),
            vec![Intent::Pdf, Intent::Summarize]
        );
    }

    #[test]
    fn test_fallback_is_message() {
        assert_eq!(labels("dinner plans on friday"), vec![Intent::Message]);
        assert_eq!(labels(""), vec![Intent::Message]);
        assert_eq!(labels("   "), vec![Intent::Message]);
    }

    #[test]
    fn test_substring_without_word_boundary() {
        assert_eq!(labels("where is the form i filed"), vec![Intent::Pdf]);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = IntentClassifier::new(
            vec!["slides".into(), "  ".into()],
            vec!["Digest".into()],
        );
        let got: Vec<_> = classifier.classify("digest of the slides").into_iter().collect();
        assert_eq!(got, vec![Intent::Pdf, Intent::Summarize]);

        // "pdf" is no longer a keyword, and the blank keyword was dropped.
        let got: Vec<_> = classifier.classify("a pdf").into_iter().collect();
        assert_eq!(got, vec![Intent::Message]);
    }
}
