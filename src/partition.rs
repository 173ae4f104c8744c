//! Per-month conversation windows over a contact's message stream.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::store::Message;

/// Speaker label for outgoing messages.
pub const OUTGOING_SPEAKER: &str = "Me";

/// Speaker label for incoming messages when the contact is not named.
pub const ANONYMOUS_SPEAKER: &str = "Them";

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Long form, e.g. "February 2024".
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One month of conversation with a contact, rendered as "speaker: text"
/// lines in message order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationWindow {
    pub contact_id: i64,
    pub period: YearMonth,
    pub lines: Vec<String>,
}

impl ConversationWindow {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Windows keyed by month, oldest first.
pub type Windows = BTreeMap<YearMonth, ConversationWindow>;

/// Group an ascending message stream into monthly windows.
///
/// Consecutive messages in the same calendar month form a run. Blank
/// messages produce no line but stay in their run. Runs with fewer than
/// `min_lines` lines, or with none at all, are dropped rather than merged
/// into a neighbour.
/// The input order is trusted; a month that reappears later in an unsorted
/// stream extends the window already built for it.
pub fn partition(
    messages: &[Message],
    contact_id: i64,
    incoming_speaker: &str,
    min_lines: usize,
) -> Windows {
    let mut windows = Windows::new();
    let mut current: Option<(YearMonth, Vec<String>)> = None;

    for message in messages {
        let period = YearMonth::of(message.timestamp);
        if current.as_ref().is_some_and(|(p, _)| *p != period) {
            if let Some((p, lines)) = current.take() {
                flush(&mut windows, contact_id, p, lines, min_lines);
            }
        }

        let (_, lines) = current.get_or_insert_with(|| (period, Vec::new()));
        let text = message.text.trim();
        if text.is_empty() {
            continue;
        }
        let speaker = if message.is_outgoing {
            OUTGOING_SPEAKER
        } else {
            incoming_speaker
        };
        lines.push(format!("{speaker}: {text}"));
    }

    if let Some((p, lines)) = current {
        flush(&mut windows, contact_id, p, lines, min_lines);
    }

    windows
}

fn flush(
    windows: &mut Windows,
    contact_id: i64,
    period: YearMonth,
    lines: Vec<String>,
    min_lines: usize,
) {
    if lines.is_empty() || lines.len() < min_lines {
        debug!(%period, lines = lines.len(), "dropping short window");
        return;
    }
    windows
        .entry(period)
        .or_insert_with(|| ConversationWindow {
            contact_id,
            period,
            lines: Vec::new(),
        })
        .lines
        .extend(lines);
}

/// Why no window could be picked for summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The contact has no window at all.
    NoConversations,
    /// The requested month has no window. `available` is most recent first.
    PeriodUnavailable {
        requested: YearMonth,
        available: Vec<YearMonth>,
    },
}

/// Months that have a window, most recent first, at most `limit` of them.
pub fn available_periods(windows: &Windows, limit: usize) -> Vec<YearMonth> {
    windows.keys().rev().take(limit).copied().collect()
}

/// Pick the requested month's window, or the latest one when `requested`
/// is `None`.
pub fn select_window(
    windows: &Windows,
    requested: Option<YearMonth>,
    suggestion_limit: usize,
) -> Result<&ConversationWindow, SelectionError> {
    match requested {
        None => windows
            .values()
            .next_back()
            .ok_or(SelectionError::NoConversations),
        Some(period) => windows.get(&period).ok_or_else(|| {
            if windows.is_empty() {
                SelectionError::NoConversations
            } else {
                SelectionError::PeriodUnavailable {
                    requested: period,
                    available: available_periods(windows, suggestion_limit),
                }
            }
        }),
    }
}
