//! Unsaved form drafts.

use crate::error::{Result, StoreError};
use crate::storage::KeyValueFile;
use crate::types::EntryData;
use std::path::Path;
use tracing::{debug, warn};

/// Key holding the draft record.
pub const DRAFT_KEY: &str = "greenhouse-log";

/// Parse a draft or sample payload into form data.
pub fn parse_record(text: &str) -> Result<EntryData> {
    serde_json::from_str(text).map_err(|e| StoreError::MalformedDraft(e.to_string()))
}

/// Saves and restores one unsaved form record, independent of the entry
/// history.
pub struct DraftStore {
    kv: KeyValueFile,
}

impl DraftStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            kv: KeyValueFile::new(path),
        }
    }

    /// Replace the stored draft.
    pub fn save(&self, data: &EntryData) -> Result<()> {
        let text = serde_json::to_string(data)?;
        self.kv
            .set(DRAFT_KEY, text)
            .map_err(StoreError::into_write)?;
        debug!(fields = data.len(), "Draft saved");
        Ok(())
    }

    /// The stored draft, or `None` when there is none.
    pub fn load(&self) -> Result<Option<EntryData>> {
        let raw = match self.kv.get(DRAFT_KEY) {
            Ok(raw) => raw,
            Err(e) => return Err(StoreError::MalformedDraft(e.to_string())),
        };
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(text) => parse_record(text).map(Some),
        }
    }

    /// Best-effort restore at startup: any failure is logged and ignored.
    pub fn restore(&self) -> Option<EntryData> {
        match self.load() {
            Ok(draft) => draft,
            Err(e) => {
                warn!(error = %e, "Draft could not be restored");
                None
            }
        }
    }

    /// Discard the stored draft. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        self.kv.remove(DRAFT_KEY).map_err(StoreError::into_write)
    }
}
