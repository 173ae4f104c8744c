//! Message frequency counts for a contact: per year, per month and per
//! hour of day.

use std::collections::BTreeMap;

use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::partition::YearMonth;
use crate::store::Message;

/// How often messages were exchanged, bucketed three ways.
///
/// Every message counts, including ones without text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    pub total: usize,
    pub yearly: BTreeMap<i32, usize>,
    pub monthly: BTreeMap<YearMonth, usize>,
    /// Index is the hour of day, 0 to 23.
    pub hourly: [usize; 24],
}

impl MessageStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut stats = Self {
            total: messages.len(),
            yearly: BTreeMap::new(),
            monthly: BTreeMap::new(),
            hourly: [0; 24],
        };
        for message in messages {
            let ts = message.timestamp;
            *stats.yearly.entry(ts.year()).or_default() += 1;
            *stats.monthly.entry(YearMonth::of(ts)).or_default() += 1;
            stats.hourly[ts.hour() as usize] += 1;
        }
        stats
    }

    /// The hour with the most messages; the earliest wins a tie.
    pub fn busiest_hour(&self) -> Option<u32> {
        let max = *self.hourly.iter().max()?;
        if max == 0 {
            return None;
        }
        self.hourly.iter().position(|&n| n == max).map(|h| h as u32)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn msg(id: i64, (y, m, d, h): (i32, u32, u32, u32), text: &str) -> Message {
        Message {
            id,
            handle_id: 1,
            timestamp: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 30, 0)
                .unwrap(),
            text: text.to_string(),
            is_outgoing: id % 2 == 0,
        }
    }

    #[test]
    fn test_counts_by_year_month_and_hour() {
        let messages = vec![
            msg(1, (2023, 12, 31, 23), "late"),
            msg(2, (2024, 1, 2, 9), "morning"),
            msg(3, (2024, 1, 2, 9), ""),
            msg(4, (2024, 3, 5, 18), "evening"),
        ];
        let stats = MessageStats::from_messages(&messages);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.yearly, BTreeMap::from([(2023, 1), (2024, 3)]));
        let monthly: Vec<(String, usize)> =
            stats.monthly.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        assert_eq!(
            monthly,
            vec![("2023-12".into(), 1), ("2024-01".into(), 2), ("2024-03".into(), 1)]
        );
        assert_eq!(stats.hourly[9], 2);
        assert_eq!(stats.hourly[23], 1);
        assert_eq!(stats.hourly.iter().sum::<usize>(), 4);
        assert_eq!(stats.busiest_hour(), Some(9));
    }

    #[test]
    fn test_empty_stream() {
        let stats = MessageStats::from_messages(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.yearly.is_empty());
        assert_eq!(stats.busiest_hour(), None);
    }

    #[test]
    fn test_serializes_months_as_keys() {
        let stats = MessageStats::from_messages(&[msg(1, (2024, 2, 1, 0), "hi")]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["monthly"]["2024-02"], 1);
        assert_eq!(json["yearly"]["2024"], 1);
        assert_eq!(json["hourly"][0], 1);
        assert_eq!(json["hourly"].as_array().unwrap().len(), 24);
    }
}
