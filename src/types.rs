//! Core types for log entries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a log entry.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Mint a fresh id from a business date plus a uniqueness token.
    ///
    /// Every non-alphanumeric character of the date becomes `-`; an empty
    /// date falls back to `eintrag`.
    pub fn mint(date: &str) -> Self {
        let base = if date.is_empty() { "eintrag" } else { date };
        EntryId(format!("{}-{}", file_safe(base), uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `text` with every character outside `[A-Za-z0-9]` replaced by `-`.
pub(crate) fn file_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        EntryId(s.to_string())
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        EntryId(s)
    }
}

/// ISO-8601 instant as persisted on entries (`2024-05-01T06:30:00.000Z`).
///
/// Kept as text so stored entries round-trip byte for byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(pub String);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Timestamp(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse into an instant, if the text is RFC 3339.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A single scalar form value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    pub fn text(s: impl Into<String>) -> Self {
        Scalar::Text(s.into())
    }

    /// Number from a float; non-finite values become `Null`.
    pub fn number(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Scalar::Null, Scalar::Number)
    }

    /// Whether this value leaves a form field unfilled.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.is_empty(),
            Scalar::Bool(_) | Scalar::Number(_) => false,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// One row of a repeating section, keyed by sub-field name.
pub type Row = BTreeMap<String, Scalar>;

/// Value of one field of an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Plain form value.
    Scalar(Scalar),
    /// Repeating section rows, in form order.
    Rows(Vec<Row>),
    /// Multi-valued form field.
    Values(Vec<Scalar>),
    /// Nested plain mapping.
    Record(Row),
}

impl FieldValue {
    /// Text of a scalar field; empty for anything else.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Scalar(Scalar::Text(s)) => s.clone(),
            FieldValue::Scalar(Scalar::Number(n)) => n.to_string(),
            FieldValue::Scalar(Scalar::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Scalar(Scalar::from(s))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Scalar(Scalar::Bool(b))
    }
}

impl From<Scalar> for FieldValue {
    fn from(s: Scalar) -> Self {
        FieldValue::Scalar(s)
    }
}

impl From<Vec<Row>> for FieldValue {
    fn from(rows: Vec<Row>) -> Self {
        FieldValue::Rows(rows)
    }
}

/// The structured form record of one day.
pub type EntryData = BTreeMap<String, FieldValue>;

/// Form key of the business date.
pub const META_DATE: &str = "meta_date";

/// Text of a data field, empty when absent or not a scalar.
pub fn field_text(data: &EntryData, key: &str) -> String {
    data.get(key).map(FieldValue::as_text).unwrap_or_default()
}

/// Drop repeating-section rows whose values are all blank.
///
/// Returns the number of rows removed.
pub fn prune_empty_rows(data: &mut EntryData) -> usize {
    let mut removed = 0;
    for value in data.values_mut() {
        if let FieldValue::Rows(rows) = value {
            let before = rows.len();
            rows.retain(|row| row.values().any(|v| !v.is_blank()));
            removed += before - rows.len();
        }
    }
    removed
}

/// Denormalized header of an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryMeta {
    pub date: String,
    pub zone: String,
    pub responsible: String,
    pub shift: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EntryMeta {
    /// Derive the header from form data.
    pub fn from_data(data: &EntryData, created_at: &Timestamp, updated_at: &Timestamp) -> Self {
        Self {
            date: field_text(data, META_DATE),
            zone: field_text(data, "meta_zone"),
            responsible: field_text(data, "meta_responsible"),
            shift: field_text(data, "meta_shift"),
            created_at: created_at.clone(),
            updated_at: updated_at.clone(),
        }
    }
}

/// One persisted daily log record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique identifier, fixed at creation.
    pub id: EntryId,

    /// When the entry was first saved.
    #[serde(default)]
    pub created_at: Timestamp,

    /// When the entry was last saved.
    #[serde(default)]
    pub updated_at: Timestamp,

    /// The form record.
    #[serde(default)]
    pub data: EntryData,

    #[serde(default)]
    pub meta: EntryMeta,
}

impl LogEntry {
    /// Build an entry, deriving its header from `data`.
    pub fn new(id: EntryId, created_at: Timestamp, updated_at: Timestamp, data: EntryData) -> Self {
        let meta = EntryMeta::from_data(&data, &created_at, &updated_at);
        Self {
            id,
            created_at,
            updated_at,
            data,
            meta,
        }
    }

    /// Business date: `meta.date`, then `data.meta_date`, else empty.
    pub fn business_date(&self) -> String {
        if !self.meta.date.is_empty() {
            return self.meta.date.clone();
        }
        field_text(&self.data, META_DATE)
    }
}
