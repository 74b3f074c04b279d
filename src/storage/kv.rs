//! String-keyed document file.

use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// One lock per file path, shared by every handle in the process.
static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    Arc::clone(
        PATH_LOCKS
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(()))),
    )
}

/// A small string-to-string map persisted as one JSON object.
///
/// Every operation reads the file fresh. Handles opened on the same path
/// share one lock, so a read-modify-write through any of them never loses
/// another handle's update. Writes go to a sibling temp file that is synced
/// and renamed over the target; a failed write leaves the old document.
pub struct KeyValueFile {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl KeyValueFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            lock: path_lock(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: &str, value: String) -> Result<()> {
        self.update(key, |_| Ok((Some(value), ())))
    }

    /// Remove `key`; returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.update(key, |current| Ok((None, current.is_some())))
    }

    /// Replace the value under `key` with what `edit` returns for the current
    /// one (`None` removes the key), atomically with respect to every handle
    /// on this path.
    ///
    /// The file is rewritten only when the value changes. An error from
    /// `edit` leaves the file untouched.
    pub fn update<T>(
        &self,
        key: &str,
        edit: impl FnOnce(Option<&str>) -> Result<(Option<String>, T)>,
    ) -> Result<T> {
        let _guard = self.lock.lock();
        let mut map = self.load()?;
        let current = map.remove(key);
        let (next, output) = edit(current.as_deref())?;
        if next == current {
            return Ok(output);
        }
        if let Some(value) = next {
            map.insert(key.to_string(), value);
        }
        self.persist(&map)?;
        Ok(output)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            StoreError::Corruption(format!(
                "Key-value file {} is not a string map: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(map)?;
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), keys = map.len(), bytes = bytes.len(), "Key-value file written");
        Ok(())
    }
}
