//! Heuristic extraction of contact fragments, time periods and cleaned
//! search text from free-form queries.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::partition::YearMonth;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Words that end a contact-name capture.
const TIME_WORDS: &[&str] = &["from", "this", "last", "month", "year", "in", "during"];

/// Words that mark a following month name as a date.
const DATE_PREPOSITIONS: &[&str] = &["in", "during", "from", "of", "for", "since"];

/// Words dropped from a captured contact name.
const NAME_STOP_WORDS: &[&str] = &["the", "my", "our", "his", "her", "their", "that"];

static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})\b").expect("valid regex"));

static ATTACHMENT_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:show me|find|get|search|pdf|open|the|file)\b").expect("valid regex")
});

static MESSAGE_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:search for|search|find)\b").expect("valid regex"));

/// The slice of history a summary request asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// The most recent conversation window.
    Recent,
    ThisMonth,
    LastMonth,
    Month(YearMonth),
}

impl Period {
    /// The calendar month this period names, relative to `today`.
    /// `Recent` names no month.
    pub fn resolve(self, today: NaiveDate) -> Option<YearMonth> {
        let current = YearMonth::of(today);
        match self {
            Self::Recent => None,
            Self::ThisMonth => Some(current),
            Self::LastMonth => Some(current.previous()),
            Self::Month(ym) => Some(ym),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recent => f.write_str("recent"),
            Self::ThisMonth => f.write_str("this_month"),
            Self::LastMonth => f.write_str("last_month"),
            Self::Month(ym) => write!(f, "{ym}"),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !(c.is_alphanumeric() || c == '+' || c == '@'))
}

fn month_number(word: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| *m == word)
        .map(|i| i as u32 + 1)
}

fn is_year(word: &str) -> bool {
    word.len() == 4 && word.chars().all(|c| c.is_ascii_digit())
}

fn ends_name_capture(word: &str) -> bool {
    TIME_WORDS.contains(&word)
        || month_number(word).is_some()
        || is_year(word)
        || YEAR_MONTH_RE.is_match(word)
}

/// Pull the contact name out of a request like
/// "summarize my conversation with John Smith from last month".
///
/// Captures the words after "with" up to the first time-related word, year
/// or `YYYY-MM` token, minus possessives and articles. Returns `None` when
/// there is no "with" or nothing usable follows it.
pub fn extract_contact_fragment(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split_whitespace()
        .map(clean_token)
        .filter(|t| !t.is_empty())
        .collect();

    let start = tokens.iter().position(|t| *t == "with")? + 1;
    let name: Vec<&str> = tokens[start..]
        .iter()
        .take_while(|t| !ends_name_capture(t))
        .filter(|t| !NAME_STOP_WORDS.contains(t))
        .copied()
        .collect();

    (!name.is_empty()).then(|| name.join(" "))
}

/// Reads `tokens[i]` as a month when it sits in a date context: right after
/// a date preposition or next to a year. "i may have" names no month.
/// Without a year, the month's most recent occurrence up to `today` is used.
fn dated_month(tokens: &[&str], i: usize, today: NaiveDate) -> Option<YearMonth> {
    let month = month_number(tokens[i])?;
    let before = i.checked_sub(1).map(|j| tokens[j]);
    let after = tokens.get(i + 1).copied();

    let year = [after, before]
        .into_iter()
        .flatten()
        .find(|t| is_year(t))
        .and_then(|t| t.parse::<i32>().ok());
    let after_preposition = before.is_some_and(|t| DATE_PREPOSITIONS.contains(&t));
    if year.is_none() && !after_preposition {
        return None;
    }

    let year = year.unwrap_or(if month <= today.month() {
        today.year()
    } else {
        today.year() - 1
    });
    YearMonth::new(year, month)
}

/// Work out which period a request asks about. Falls back to
/// [`Period::Recent`].
pub fn extract_period(query: &str, today: NaiveDate) -> Period {
    let lowered = query.to_lowercase();

    if let Some(ym) = YEAR_MONTH_RE.captures_iter(&lowered).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        YearMonth::new(year, month)
    }) {
        return Period::Month(ym);
    }

    if lowered.contains("this month") {
        return Period::ThisMonth;
    }
    if lowered.contains("last month") {
        return Period::LastMonth;
    }

    let tokens: Vec<&str> = lowered.split_whitespace().map(clean_token).collect();
    if let Some(ym) = (0..tokens.len()).find_map(|i| dated_month(&tokens, i, today)) {
        return Period::Month(ym);
    }

    Period::Recent
}

/// Strip document-lookup instruction words so only the descriptive part of
/// the query is matched against filenames.
pub fn clean_attachment_query(query: &str) -> String {
    collapse(&ATTACHMENT_NOISE_RE.replace_all(&query.to_lowercase(), " "))
}

/// Strip search instruction words from a message search query.
pub fn clean_message_query(query: &str) -> String {
    collapse(&MESSAGE_NOISE_RE.replace_all(&query.to_lowercase(), " "))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
