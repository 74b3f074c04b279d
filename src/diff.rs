//! Field-level change detection between two entry snapshots.

use crate::normalize::scalar_key;
use crate::types::{EntryData, FieldValue, Scalar};
use std::collections::BTreeSet;

/// Fields that differ between two records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryDiff {
    /// Changed field names, deduplicated, in key order.
    pub changed_fields: Vec<String>,
}

impl EntryDiff {
    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed_fields.len()
    }
}

/// Compare two records field by field.
///
/// A field is classified by the shape found on either side: list values
/// compare by ordered serialized content, nested mappings by canonical
/// serialization, scalars by [`scalar_key`]. A whole repeating section is
/// reported as one field, never its individual row cells.
pub fn diff(previous: &EntryData, current: &EntryData) -> EntryDiff {
    let keys: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();

    let changed_fields = keys
        .into_iter()
        .filter(|key| !field_equal(previous.get(*key), current.get(*key)))
        .cloned()
        .collect();

    EntryDiff { changed_fields }
}

fn field_equal(prev: Option<&FieldValue>, curr: Option<&FieldValue>) -> bool {
    if is_list(prev) || is_list(curr) {
        return match (prev, curr) {
            (Some(a), Some(b)) if is_list(prev) && is_list(curr) => {
                list_len(a) == list_len(b) && canonical(Some(a)) == canonical(Some(b))
            }
            _ => false,
        };
    }

    if is_record(prev) || is_record(curr) {
        return canonical(prev) == canonical(curr);
    }

    scalar_equal(as_scalar(prev), as_scalar(curr))
}

fn is_list(value: Option<&FieldValue>) -> bool {
    matches!(value, Some(FieldValue::Rows(_)) | Some(FieldValue::Values(_)))
}

fn is_record(value: Option<&FieldValue>) -> bool {
    matches!(value, Some(FieldValue::Record(_)))
}

fn list_len(value: &FieldValue) -> usize {
    match value {
        FieldValue::Rows(rows) => rows.len(),
        FieldValue::Values(values) => values.len(),
        _ => 0,
    }
}

fn as_scalar(value: Option<&FieldValue>) -> &Scalar {
    const NULL: &Scalar = &Scalar::Null;
    value.and_then(FieldValue::as_scalar).unwrap_or(NULL)
}

/// Canonical text of a value; absent values serialize as `null`.
fn canonical(value: Option<&FieldValue>) -> Option<String> {
    match value {
        Some(v) => serde_json::to_string(v).ok(),
        None => Some("null".to_string()),
    }
}

/// Booleans only ever equal booleans; other scalars compare by key, so
/// `1` equals `"1"` while `true` differs from `"true"`.
fn scalar_equal(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::Bool(x), Scalar::Bool(y)) => x == y,
        (Scalar::Bool(_), _) | (_, Scalar::Bool(_)) => false,
        _ => scalar_key(a) == scalar_key(b),
    }
}
