//! Log-structured entry store.

use super::index::EntryIndex;
use super::log::{EntryLog, Frame, FrameOp};
use super::{run_blocking, BackendKind, EntryStore, StoreConfig};
use crate::error::{Result, StoreError};
use crate::types::LogEntry;
use async_trait::async_trait;
use fs2::FileExt;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"GHL\0";

/// Current store schema version.
const STORE_VERSION: u8 = 1;

const LOG_FILE: &str = "entries.log";

/// Entry store backed by an append-only log in its own directory.
///
/// Nothing touches the disk until [`EntryStore::ready`] runs.
pub struct IndexedStore {
    config: StoreConfig,
    inner: OnceCell<Arc<IndexedInner>>,
}

impl IndexedStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn inner(&self) -> Result<Arc<IndexedInner>> {
        self.inner.get().cloned().ok_or(StoreError::NotInitialized)
    }
}

#[async_trait]
impl EntryStore for IndexedStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Indexed
    }

    async fn ready(&self) -> Result<()> {
        let config = self.config.clone();
        self.inner
            .get_or_try_init(|| async move {
                run_blocking(move || IndexedInner::open(&config))
                    .await
                    .map(Arc::new)
            })
            .await
            .map(|_| ())
            .map_err(StoreError::into_init)
    }

    async fn save(&self, entry: LogEntry) -> Result<LogEntry> {
        let inner = self.inner()?;
        run_blocking(move || inner.put(entry))
            .await
            .map_err(StoreError::into_write)
    }

    async fn get_all(&self) -> Result<Vec<LogEntry>> {
        let inner = self.inner()?;
        run_blocking(move || inner.all())
            .await
            .map_err(StoreError::into_read)
    }

    async fn get(&self, id: &str) -> Result<Option<LogEntry>> {
        let inner = self.inner()?;
        let id = id.to_string();
        run_blocking(move || inner.get(&id))
            .await
            .map_err(StoreError::into_read)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let inner = self.inner()?;
        let id = id.to_string();
        run_blocking(move || inner.remove(&id))
            .await
            .map_err(StoreError::into_write)
    }
}

/// Open state of an indexed store.
///
/// Readers hold the index read guard while reading a frame, so compaction
/// (which holds the write guard) never moves frames under them.
struct IndexedInner {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: EntryLog,

    index: RwLock<EntryIndex>,

    /// Recently decoded entries.
    cache: Mutex<LruCache<String, LogEntry>>,

    /// Serializes writers so frames never interleave.
    write_lock: Mutex<()>,

    compact_after_dead_frames: u64,
}

impl IndexedInner {
    fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.clone();

        if !path.is_dir() {
            if !config.create_if_missing {
                return Err(StoreError::Init(format!(
                    "Store directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(&path)?;
        }

        let lock_file = Self::acquire_lock(&path)?;

        match Self::read_manifest(&path)? {
            None => {
                Self::write_manifest(&path)?;
                info!(path = %path.display(), "Created entry store");
            }
            Some(version) if version < STORE_VERSION => {
                Self::write_manifest(&path)?;
                info!(
                    path = %path.display(),
                    from = version,
                    to = STORE_VERSION,
                    "Upgraded entry store schema"
                );
            }
            Some(version) if version > STORE_VERSION => {
                return Err(StoreError::Init(format!(
                    "Store schema version {} is newer than supported version {}",
                    version, STORE_VERSION
                )));
            }
            Some(_) => {}
        }

        let (log, frames) = EntryLog::open(path.join(LOG_FILE))?;
        let index = EntryIndex::rebuild(&frames);
        info!(
            path = %path.display(),
            entries = index.live_count(),
            dead_frames = index.dead_frames(),
            "Entry store opened"
        );

        let cache_size = NonZeroUsize::new(config.entry_cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            _lock_file: lock_file,
            log,
            index: RwLock::new(index),
            cache: Mutex::new(LruCache::new(cache_size)),
            write_lock: Mutex::new(()),
            compact_after_dead_frames: config.compact_after_dead_frames,
        })
    }

    fn put(&self, entry: LogEntry) -> Result<LogEntry> {
        let payload = serde_json::to_vec(&entry)?;
        let key = entry.id.as_str().to_string();

        let _guard = self.write_lock.lock();
        let (offset, seq) = self.log.append(FrameOp::Put, &key, &payload)?;
        {
            let mut index = self.index.write();
            index.apply(FrameOp::Put, &key, offset);
            self.cache.lock().put(key.clone(), entry.clone());
        }
        debug!(id = %key, seq, offset, "Entry saved");

        self.compact_after_commit();
        Ok(entry)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let existed = self.index.read().offset_of(id).is_some();

        let (offset, seq) = self.log.append(FrameOp::Delete, id, &[])?;
        {
            let mut index = self.index.write();
            index.apply(FrameOp::Delete, id, offset);
            self.cache.lock().pop(id);
        }
        debug!(id, seq, existed, "Entry deleted");

        self.compact_after_commit();
        Ok(existed)
    }

    fn get(&self, id: &str) -> Result<Option<LogEntry>> {
        if let Some(entry) = self.cache.lock().get(id).cloned() {
            return Ok(Some(entry));
        }

        let index = self.index.read();
        let offset = match index.offset_of(id) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let entry = self.decode_at(offset)?;

        // cached under the read guard, so a concurrent writer's update of
        // this id always lands after ours
        self.cache.lock().put(id.to_string(), entry.clone());
        drop(index);
        Ok(Some(entry))
    }

    fn all(&self) -> Result<Vec<LogEntry>> {
        let index = self.index.read();
        index
            .live()
            .into_iter()
            .map(|(id, offset)| match self.cache.lock().get(&id).cloned() {
                Some(entry) => Ok(entry),
                None => self.decode_at(offset),
            })
            .collect()
    }

    fn decode_at(&self, offset: u64) -> Result<LogEntry> {
        let frame = self.log.read_at(offset)?;
        if frame.op != FrameOp::Put {
            return Err(StoreError::Corruption(format!(
                "Index points at a non-put frame at offset {}",
                offset
            )));
        }
        serde_json::from_slice(&frame.payload)
            .map_err(|e| StoreError::Deserialization(format!("Entry {}: {}", frame.key, e)))
    }

    /// Compact once a write is durable. The write already succeeded, so a
    /// failed compaction is logged and the old log stays in use.
    fn compact_after_commit(&self) {
        if let Err(e) = self.compact_if_needed() {
            warn!(path = %self.path.display(), error = %e, "Entry log compaction failed");
        }
    }

    /// Rewrite the log with live entries only. Caller holds `write_lock`.
    fn compact_if_needed(&self) -> Result<()> {
        let mut index = self.index.write();
        if !index.needs_compaction(self.compact_after_dead_frames) {
            return Ok(());
        }

        let before = self.log.size();
        let live = index.live();
        let mut frames = Vec::with_capacity(live.len());
        for (_, offset) in &live {
            frames.push(self.log.read_at(*offset)?);
        }

        let offsets = self.log.rewrite(&frames)?;
        let dead = index.dead_frames();
        index.reset(
            frames
                .into_iter()
                .map(|frame: Frame| frame.key)
                .zip(offsets),
        );

        debug!(
            path = %self.path.display(),
            live = live.len(),
            dropped = dead,
            bytes_before = before,
            bytes_after = self.log.size(),
            "Compacted entry log"
        );
        Ok(())
    }

    fn read_manifest(path: &Path) -> Result<Option<u8>> {
        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        Ok(Some(version[0]))
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}
