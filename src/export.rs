//! JSON export of a day's form record.

use crate::error::{Result, StoreError};
use crate::types::{field_text, file_safe, EntryData, META_DATE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Export file name for a business date; today's local date when blank.
///
/// Characters other than ASCII letters and digits become `-`, so the name
/// never leaves the export directory.
pub fn file_name(date: Option<&str>) -> String {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => format!("tagesprotokoll-{}.json", file_safe(date)),
        None => format!(
            "tagesprotokoll-{}.json",
            chrono::Local::now().format("%Y-%m-%d")
        ),
    }
}

/// Two-space indented JSON of `data`.
pub fn to_pretty_json(data: &EntryData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Write `data` into `dir`, named after its business date.
///
/// Returns the path of the written file.
pub fn write_export(dir: impl AsRef<Path>, data: &EntryData) -> Result<PathBuf> {
    let date = field_text(data, META_DATE);
    let path = dir.as_ref().join(file_name(Some(&date)));

    let text = to_pretty_json(data)?;
    fs::write(&path, text).map_err(|e| StoreError::Write(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), "Exported entry data");
    Ok(path)
}
