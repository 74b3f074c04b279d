//! Entry persistence.
//!
//! Two interchangeable backends implement [`EntryStore`]:
//!
//! - [`IndexedStore`]: a directory holding a CRC-framed append-only log plus
//!   an id index rebuilt on open. Every save or delete is one durable frame.
//! - [`FlatListStore`]: the whole collection as one JSON array inside a
//!   key-value file, rewritten on every change.
//!
//! [`open_store`] picks one at startup according to
//! [`StoreConfig::backend`].

mod flat;
mod index;
mod indexed;
mod kv;
mod log;

pub use flat::{FlatListStore, ENTRIES_KEY};
pub use indexed::IndexedStore;
pub use kv::KeyValueFile;

use crate::error::Result;
use crate::types::LogEntry;
use async_trait::async_trait;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, warn};

/// Which backend serves a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Indexed,
    Flat,
}

/// Requested backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendPreference {
    /// Indexed when the store directory is usable, flat otherwise.
    #[default]
    Auto,
    Indexed,
    Flat,
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory of the indexed store. The key-value file lives next to it.
    pub path: PathBuf,

    /// Backend to use.
    pub backend: BackendPreference,

    /// Decoded entries kept in memory by the indexed backend.
    pub entry_cache_size: usize,

    /// Dead log frames tolerated before the indexed log is compacted.
    pub compact_after_dead_frames: u64,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./greenhouse-log"),
            backend: BackendPreference::Auto,
            entry_cache_size: 256,
            compact_after_dead_frames: 512,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Config rooted at `path` with default settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Key-value file shared by the flat backend and drafts: `<path>.kv.json`.
    pub fn kv_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".kv.json");
        PathBuf::from(name)
    }
}

/// Async persistence contract shared by both backends.
///
/// `ready()` must succeed before any other call; until then every operation
/// fails with [`StoreError::NotInitialized`](crate::StoreError::NotInitialized).
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Backend serving this store.
    fn backend(&self) -> BackendKind;

    /// Initialize the backend. Idempotent.
    async fn ready(&self) -> Result<()>;

    /// Insert or replace the entry with the same id.
    async fn save(&self, entry: LogEntry) -> Result<LogEntry>;

    /// Every stored entry, in no particular order.
    async fn get_all(&self) -> Result<Vec<LogEntry>>;

    /// The entry with `id`, or `None` when absent.
    async fn get(&self, id: &str) -> Result<Option<LogEntry>>;

    /// Remove the entry with `id`. Removing an absent id succeeds.
    ///
    /// Returns whether an entry was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Pick a backend for `config`.
///
/// With [`BackendPreference::Auto`] the store directory is probed once; if it
/// cannot be created or locked the flat list is used instead.
pub fn open_store(config: &StoreConfig) -> Box<dyn EntryStore> {
    let kind = match config.backend {
        BackendPreference::Indexed => BackendKind::Indexed,
        BackendPreference::Flat => BackendKind::Flat,
        BackendPreference::Auto => match probe_directory(config) {
            Ok(()) => BackendKind::Indexed,
            Err(e) => {
                warn!(
                    path = %config.path.display(),
                    error = %e,
                    "Indexed store unavailable, falling back to flat list"
                );
                BackendKind::Flat
            }
        },
    };

    info!(backend = ?kind, path = %config.path.display(), "Entry store selected");

    match kind {
        BackendKind::Indexed => Box::new(IndexedStore::new(config.clone())),
        BackendKind::Flat => Box::new(FlatListStore::new(config.kv_path())),
    }
}

/// Check that the store directory exists (or can be made) and is not locked.
fn probe_directory(config: &StoreConfig) -> std::io::Result<()> {
    if !config.path.is_dir() {
        if !config.create_if_missing {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "store directory missing",
            ));
        }
        fs::create_dir_all(&config.path)?;
    }

    let lock_file = File::create(config.path.join("LOCK"))?;
    lock_file.try_lock_exclusive()?;
    lock_file.unlock()?;
    Ok(())
}

/// Run blocking file work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
