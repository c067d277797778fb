//! Snapshot history ("sparkline") for a URL.
//!
//! History only feeds reply details, so every failure degrades to
//! [`HistoryLookup::Unavailable`] instead of an error.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Serialize;

use super::response::SparklineResponse;

/// Layout of archive.org timestamps: `YYYYMMDDHHMMSS`, always UTC.
pub const TIMESTAMP_LAYOUT: &str = "%Y%m%d%H%M%S";

/// Parse a 14-digit archive timestamp as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if ts.len() != 14 || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_LAYOUT).ok().map(|naive| naive.and_utc())
}

/// When a URL was captured and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotHistory {
    /// Raw timestamp of the oldest capture, as used in archive URLs.
    pub first_ts: String,
    pub last_ts: String,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    /// Captures per month, keyed by year; index 0 is January.
    pub years: BTreeMap<i32, [u32; 12]>,
}

impl SnapshotHistory {
    /// Total number of captures across every year and month.
    pub fn total(&self) -> u64 {
        self.years.values().flatten().map(|&n| u64::from(n)).sum()
    }

    pub fn first_in(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.first.with_timezone(&offset)
    }

    pub fn last_in(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.last.with_timezone(&offset)
    }
}

/// Outcome of a history lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryLookup {
    Available(SnapshotHistory),
    Unavailable { reason: String },
}

impl HistoryLookup {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        HistoryLookup::Unavailable { reason: reason.into() }
    }

    pub fn history(&self) -> Option<&SnapshotHistory> {
        match self {
            HistoryLookup::Available(history) => Some(history),
            HistoryLookup::Unavailable { .. } => None,
        }
    }
}

impl From<SparklineResponse> for HistoryLookup {
    fn from(raw: SparklineResponse) -> Self {
        let (Some(first_ts), Some(last_ts)) = (raw.first_ts, raw.last_ts) else {
            return HistoryLookup::unavailable("no capture timestamps");
        };
        let Some(first) = parse_timestamp(&first_ts) else {
            return HistoryLookup::unavailable(format!("bad first timestamp {first_ts:?}"));
        };
        let Some(last) = parse_timestamp(&last_ts) else {
            return HistoryLookup::unavailable(format!("bad last timestamp {last_ts:?}"));
        };

        let mut years = BTreeMap::new();
        for (year, months) in raw.years {
            let Ok(year) = year.parse::<i32>() else {
                return HistoryLookup::unavailable(format!("bad year {year:?}"));
            };
            let mut counts = [0_u32; 12];
            for (slot, count) in counts.iter_mut().zip(months) {
                *slot = count;
            }
            years.insert(year, counts);
        }

        if years.is_empty() {
            return HistoryLookup::unavailable("empty histogram");
        }

        HistoryLookup::Available(SnapshotHistory { first_ts, last_ts, first, last, years })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn sparkline(json: &str) -> HistoryLookup {
        serde_json::from_str::<SparklineResponse>(json).unwrap().into()
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("20230101123045").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 1, 1));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (12, 30, 45));

        assert!(parse_timestamp("2023010112304").is_none());
        assert!(parse_timestamp("2023-01-01T12:3").is_none());
        assert!(parse_timestamp("20231301000000").is_none());
    }

    #[test]
    fn test_history_totals() {
        let lookup = sparkline(
            r#"{"years": {"2022": [1,0,0,0,0,0,0,0,0,0,0,2], "2023": [3,4,0,0,0,0,0,0,0,0,0,0]},
                "first_ts": "20220115000000", "last_ts": "20230220000000"}"#,
        );
        let history = lookup.history().unwrap();
        assert_eq!(history.total(), 10);
        assert_eq!(history.years[&2023][1], 4);
        assert_eq!(history.first_ts, "20220115000000");
    }

    #[test]
    fn test_history_offset_projection() {
        let lookup = sparkline(r#"{"years": {"2023": [1]}, "first_ts": "20230101020000", "last_ts": "20230101020000"}"#);
        let history = lookup.history().unwrap();
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        let local = history.first_in(offset);
        assert_eq!((local.day(), local.hour()), (31, 22));
        assert_eq!(local.year(), 2022);
    }

    #[test]
    fn test_history_unavailable_cases() {
        assert!(matches!(sparkline(r#"{"years": {}}"#), HistoryLookup::Unavailable { .. }));
        assert!(matches!(
            sparkline(r#"{"years": {}, "first_ts": "20230101000000", "last_ts": "20230101000000"}"#),
            HistoryLookup::Unavailable { .. }
        ));
        assert!(matches!(
            sparkline(r#"{"years": {"2023": [1]}, "first_ts": "soon", "last_ts": "20230101000000"}"#),
            HistoryLookup::Unavailable { .. }
        ));
        assert!(matches!(
            sparkline(r#"{"years": {"later": [1]}, "first_ts": "20230101000000", "last_ts": "20230101000000"}"#),
            HistoryLookup::Unavailable { .. }
        ));
    }
}
