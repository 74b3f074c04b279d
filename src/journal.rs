//! Application context tying the entry store to the analytics.

use crate::analytics::{aggregate, analyze_trends, chronological, sort_for_history};
use crate::analytics::{ChangeStats, TrendReport};
use crate::error::{Result, StoreError};
use crate::fields::TREND_METRICS;
use crate::storage::{open_store, BackendKind, EntryStore, StoreConfig};
use crate::types::{field_text, prune_empty_rows, EntryData, EntryId, LogEntry, Timestamp, META_DATE};
use serde::Serialize;
use tracing::{debug, info};

/// Entry currently loaded for editing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditTarget {
    pub id: EntryId,
    /// Creation time carried over to the next save.
    pub created_at: Timestamp,
}

impl EditTarget {
    fn of(entry: &LogEntry) -> Self {
        let created_at = if entry.created_at.is_empty() {
            entry.meta.created_at.clone()
        } else {
            entry.created_at.clone()
        };
        Self {
            id: entry.id.clone(),
            created_at,
        }
    }
}

/// Result of [`Journal::save_entry`].
#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    pub entry: LogEntry,
    /// `true` when an existing entry was overwritten.
    pub updated: bool,
}

/// Everything the history view shows at once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistorySnapshot {
    /// Most recently updated first.
    pub entries: Vec<LogEntry>,
    pub statistics: Option<ChangeStats>,
    pub trends: TrendReport,
}

/// Daily log journal: the store, the cached history and the edit target.
pub struct Journal {
    store: Box<dyn EntryStore>,
    history: Vec<LogEntry>,
    edit_target: Option<EditTarget>,
}

impl Journal {
    /// Select a backend for `config`, initialize it and load the history.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        Self::with_store(open_store(config)).await
    }

    /// Initialize `store` and load the history.
    pub async fn with_store(store: Box<dyn EntryStore>) -> Result<Self> {
        store.ready().await?;
        let mut journal = Self {
            store,
            history: Vec::new(),
            edit_target: None,
        };
        journal.refresh().await?;
        info!(
            backend = ?journal.backend(),
            entries = journal.history.len(),
            "Journal opened"
        );
        Ok(journal)
    }

    pub fn backend(&self) -> BackendKind {
        self.store.backend()
    }

    /// Save form data as a new entry, or over the edit target.
    ///
    /// Data without a business date is rejected before the store is touched.
    /// A failed save leaves the history and the edit target as they were.
    pub async fn save_entry(&mut self, mut data: EntryData) -> Result<SaveOutcome> {
        let date = field_text(&data, META_DATE);
        if date.trim().is_empty() {
            return Err(StoreError::Validation(
                "meta_date is required to save an entry".into(),
            ));
        }

        let pruned = prune_empty_rows(&mut data);
        let now = Timestamp::now();
        let (id, created_at, updated) = match &self.edit_target {
            Some(target) => (target.id.clone(), target.created_at.clone(), true),
            None => (EntryId::mint(&date), now.clone(), false),
        };
        let created_at = if created_at.is_empty() { now.clone() } else { created_at };

        let entry = LogEntry::new(id, created_at, now, data);
        let saved = self.store.save(entry).await?;
        debug!(id = %saved.id, updated, pruned_rows = pruned, "Entry saved");

        // the entry is durable from here on; keep editing it even if the
        // reload below fails
        self.edit_target = Some(EditTarget::of(&saved));
        self.refresh().await?;

        let entry = self.find(&saved.id).cloned().unwrap_or(saved);
        Ok(SaveOutcome { entry, updated })
    }

    /// Fetch an entry and make it the edit target. `None` when absent.
    pub async fn load_entry(&mut self, id: &str) -> Result<Option<LogEntry>> {
        let entry = self.store.get(id).await?;
        if let Some(entry) = &entry {
            self.edit_target = Some(EditTarget::of(entry));
        }
        Ok(entry)
    }

    /// Delete an entry and reload the history.
    pub async fn delete_entry(&mut self, id: &str) -> Result<bool> {
        let removed = self.store.delete(id).await?;
        if self
            .edit_target
            .as_ref()
            .is_some_and(|target| target.id.as_str() == id)
        {
            self.edit_target = None;
        }
        self.refresh().await?;
        Ok(removed)
    }

    /// Forget the edit target so the next save creates a new entry.
    pub fn clear_edit_target(&mut self) {
        self.edit_target = None;
    }

    pub fn edit_target(&self) -> Option<&EditTarget> {
        self.edit_target.as_ref()
    }

    /// Reload the history from the store.
    pub async fn refresh(&mut self) -> Result<()> {
        let mut entries = self.store.get_all().await?;
        sort_for_history(&mut entries);
        self.history = entries;
        Ok(())
    }

    /// Cached history, most recently updated first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.history
    }

    /// Cached entry with `id`.
    pub fn find(&self, id: &EntryId) -> Option<&LogEntry> {
        self.history.iter().find(|entry| &entry.id == id)
    }

    /// Change statistics over the history in date order.
    pub fn statistics(&self) -> Option<ChangeStats> {
        aggregate(&chronological(&self.history))
    }

    /// Trends of the standard metrics over the history.
    pub fn trends(&self) -> TrendReport {
        analyze_trends(&chronological(&self.history), TREND_METRICS)
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let ordered = chronological(&self.history);
        HistorySnapshot {
            entries: self.history.clone(),
            statistics: aggregate(&ordered),
            trends: analyze_trends(&ordered, TREND_METRICS),
        }
    }
}
