//! # Greenhouse Log
//!
//! Daily greenhouse log entries: persistence behind one async contract, plus
//! pure analytics over the stored history.
//!
//! ## Core Concepts
//!
//! - **Entries**: one structured form record per day, keyed by a unique id
//! - **Stores**: an indexed log-structured backend and a flat-list fallback
//! - **Analytics**: field diffs, change statistics and metric trends
//! - **Journal**: the application context owning the store and edit state
//!
//! ## Example
//!
//! ```ignore
//! use greenhouse_log::{EntryData, Journal, StoreConfig};
//!
//! let mut journal = Journal::open(&StoreConfig::at("./greenhouse-log")).await?;
//!
//! let mut data = EntryData::new();
//! data.insert("meta_date".into(), "2024-05-01".into());
//! data.insert("climate_inside_temp_avg".into(), "21.5".into());
//! journal.save_entry(data).await?;
//!
//! for trend in journal.trends().results {
//!     println!("{} {}", trend.direction.symbol(), trend.label);
//! }
//! ```

pub mod analytics;
pub mod diff;
pub mod draft;
pub mod error;
pub mod export;
pub mod fields;
pub mod journal;
pub mod normalize;
pub mod storage;
pub mod types;

// Re-exports
pub use analytics::{
    aggregate, analyze_trends, ChangeStats, EntryChanges, FieldCount, TrendDirection,
    TrendReport, TrendResult,
};
pub use diff::{diff, EntryDiff};
pub use draft::{parse_record, DraftStore};
pub use error::{ErrorKind, Result, StoreError};
pub use fields::{humanize_field_name, RepeatingSection, TrendMetric, TREND_METRICS};
pub use journal::{EditTarget, HistorySnapshot, Journal, SaveOutcome};
pub use storage::{
    open_store, BackendKind, BackendPreference, EntryStore, FlatListStore, IndexedStore,
    KeyValueFile, StoreConfig,
};
pub use types::*;
