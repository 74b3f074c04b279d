//! Date normalization and entry ordering.

use crate::types::LogEntry;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Sortable text form of a date or instant.
///
/// - `YYYY-MM-DD` becomes midnight of that day (`YYYY-MM-DDT00:00:00`)
/// - RFC 3339 instants become UTC with milliseconds (`...T06:00:00.000Z`)
/// - offset-less date-times (`YYYY-MM-DDTHH:MM[:SS[.fff]]` or
///   `YYYY-MM-DD HH:MM:SS[.fff]`) are read as UTC
/// - anything else, including slash or dotted dates such as `2024/05/01`
///   or `01.05.2024`, is returned unchanged and sorts lexically
pub fn normalize_date_for_sort(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if is_plain_date(value) {
        return format!("{}T00:00:00", value);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return iso_millis(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return iso_millis(naive.and_utc());
        }
    }
    value.to_string()
}

fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn is_plain_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Chronological key of an entry: business date, else creation, else update.
pub fn entry_sort_key(entry: &LogEntry) -> String {
    let primary = normalize_date_for_sort(&entry.business_date());
    if !primary.is_empty() {
        return primary;
    }
    let fallback = if entry.created_at.is_empty() {
        &entry.updated_at
    } else {
        &entry.created_at
    };
    normalize_date_for_sort(fallback.as_str())
}

/// Sort oldest first; equal keys keep their order.
pub fn sort_chronologically(entries: &mut [LogEntry]) {
    entries.sort_by_cached_key(entry_sort_key);
}

/// Sorted copy, oldest first.
pub fn chronological(entries: &[LogEntry]) -> Vec<LogEntry> {
    let mut sorted = entries.to_vec();
    sort_chronologically(&mut sorted);
    sorted
}

/// Sort most recently updated first, as the history list shows them.
pub fn sort_for_history(entries: &mut [LogEntry]) {
    entries.sort_by(|a, b| history_key(b).cmp(history_key(a)));
}

fn history_key(entry: &LogEntry) -> &str {
    [&entry.updated_at, &entry.meta.updated_at, &entry.created_at]
        .into_iter()
        .find(|ts| !ts.is_empty())
        .map_or("", |ts| ts.as_str())
}
