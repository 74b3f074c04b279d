//! Whole-list fallback store.

use super::kv::KeyValueFile;
use super::{run_blocking, BackendKind, EntryStore};
use crate::error::{Result, StoreError};
use crate::types::LogEntry;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Key holding the serialized entry list.
pub const ENTRIES_KEY: &str = "greenhouse-log-entries";

/// Entry store that keeps the whole collection as one JSON array.
///
/// Every operation reads and, for writes, rewrites the full list. Slower
/// than [`IndexedStore`](super::IndexedStore) but needs only a single file.
pub struct FlatListStore {
    kv: Arc<KeyValueFile>,
    ready: AtomicBool,
}

impl FlatListStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            kv: Arc::new(KeyValueFile::new(path)),
            ready: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        self.kv.path()
    }

    fn kv(&self) -> Result<Arc<KeyValueFile>> {
        if self.ready.load(Ordering::Acquire) {
            Ok(Arc::clone(&self.kv))
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

fn parse_list(raw: Option<&str>) -> Result<Vec<LogEntry>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            StoreError::Read(format!("Stored entry list is malformed: {}", e))
        }),
    }
}

fn read_list(kv: &KeyValueFile) -> Result<Vec<LogEntry>> {
    parse_list(kv.get(ENTRIES_KEY)?.as_deref())
}

/// Apply `edit` to the stored list in one read-modify-write cycle. The list
/// is written back only when `edit` reports a change.
fn update_list<T>(
    kv: &KeyValueFile,
    edit: impl FnOnce(&mut Vec<LogEntry>) -> (bool, T),
) -> Result<T> {
    kv.update(ENTRIES_KEY, |raw| {
        let mut entries = parse_list(raw)?;
        let (changed, output) = edit(&mut entries);
        let next = if changed {
            Some(serde_json::to_string(&entries)?)
        } else {
            raw.map(str::to_string)
        };
        Ok((next, output))
    })
}

#[async_trait]
impl EntryStore for FlatListStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Flat
    }

    async fn ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let kv = Arc::clone(&self.kv);
        run_blocking(move || kv.get(ENTRIES_KEY).map(|_| ()))
            .await
            .map_err(StoreError::into_init)?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn save(&self, entry: LogEntry) -> Result<LogEntry> {
        let kv = self.kv()?;
        run_blocking(move || {
            let total = update_list(&kv, |entries| {
                match entries.iter_mut().find(|e| e.id == entry.id) {
                    Some(slot) => *slot = entry.clone(),
                    None => entries.push(entry.clone()),
                }
                (true, entries.len())
            })?;
            debug!(id = %entry.id, total, "Entry saved to flat list");
            Ok(entry)
        })
        .await
        .map_err(StoreError::into_write)
    }

    async fn get_all(&self) -> Result<Vec<LogEntry>> {
        let kv = self.kv()?;
        run_blocking(move || read_list(&kv))
            .await
            .map_err(StoreError::into_read)
    }

    async fn get(&self, id: &str) -> Result<Option<LogEntry>> {
        let kv = self.kv()?;
        let id = id.to_string();
        run_blocking(move || Ok(read_list(&kv)?.into_iter().find(|e| e.id.as_str() == id)))
            .await
            .map_err(StoreError::into_read)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let kv = self.kv()?;
        let id = id.to_string();
        run_blocking(move || {
            let removed = update_list(&kv, |entries| {
                let before = entries.len();
                entries.retain(|e| e.id.as_str() != id);
                let removed = entries.len() < before;
                (removed, removed)
            })?;
            debug!(id = %id, removed, "Entry deleted from flat list");
            Ok(removed)
        })
        .await
        .map_err(StoreError::into_write)
    }
}
