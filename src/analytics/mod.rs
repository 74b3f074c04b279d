//! Historical analytics over stored entries.
//!
//! Everything here is pure: functions take the entries they analyze and
//! return fresh values, so they can run in any order and as often as needed.

pub mod chronology;
mod stats;
mod trends;

pub use chronology::{
    chronological, entry_sort_key, normalize_date_for_sort, sort_chronologically,
    sort_for_history,
};
pub use stats::{aggregate, ChangeStats, EntryChanges, FieldCount};
pub use trends::{
    analyze_metric, analyze_trends, collect_samples, order_for_presentation, tolerance_for,
    TrendDirection, TrendReport, TrendResult, TrendSample,
};
