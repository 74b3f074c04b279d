//! Change statistics over consecutive entries.

use crate::diff::diff;
use crate::fields::humanize_field_name;
use crate::types::{EntryId, LogEntry, Timestamp};
use serde::Serialize;
use std::collections::HashMap;

/// How often a field changed between consecutive entries.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldCount {
    pub field: String,
    pub label: String,
    pub count: usize,
}

/// Changes of one entry relative to its predecessor.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryChanges {
    pub id: EntryId,
    pub date: String,
    pub created_at: Timestamp,
    pub count: usize,
    pub fields: Vec<String>,
}

/// Aggregate change statistics of a history.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStats {
    pub total_entries: usize,
    pub compared_pairs: usize,
    pub avg_changes: f64,
    /// Most frequently changed first.
    pub top_fields: Vec<FieldCount>,
    /// One summary per compared pair, in chronological order.
    pub per_entry: Vec<EntryChanges>,
}

impl ChangeStats {
    /// The last `n` summaries, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &EntryChanges> {
        self.per_entry.iter().rev().take(n)
    }
}

/// Diff each entry against its predecessor and tally the changed fields.
///
/// `entries` must already be in chronological order. Fewer than two entries
/// yield `None`.
pub fn aggregate(entries: &[LogEntry]) -> Option<ChangeStats> {
    if entries.len() < 2 {
        return None;
    }

    let mut change_counter: HashMap<String, usize> = HashMap::new();
    let mut per_entry = Vec::with_capacity(entries.len() - 1);
    let mut total_changed = 0usize;

    for pair in entries.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let changes = diff(&previous.data, &current.data);

        total_changed += changes.len();
        for field in &changes.changed_fields {
            *change_counter.entry(field.clone()).or_default() += 1;
        }

        per_entry.push(EntryChanges {
            id: current.id.clone(),
            date: current.business_date(),
            created_at: current.created_at.clone(),
            count: changes.len(),
            fields: changes.changed_fields,
        });
    }

    let mut top_fields: Vec<FieldCount> = change_counter
        .into_iter()
        .map(|(field, count)| FieldCount {
            label: humanize_field_name(&field),
            field,
            count,
        })
        .collect();
    top_fields.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.field.cmp(&b.field)));

    let compared_pairs = entries.len() - 1;

    Some(ChangeStats {
        total_entries: entries.len(),
        compared_pairs,
        avg_changes: total_changed as f64 / compared_pairs as f64,
        top_fields,
        per_entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryData, FieldValue, META_DATE};

    fn entry(id: &str, date: &str, fields: &[(&str, &str)]) -> LogEntry {
        let mut data = EntryData::new();
        data.insert(META_DATE.into(), date.into());
        for (k, v) in fields {
            data.insert(k.to_string(), FieldValue::from(*v));
        }
        LogEntry::new(
            EntryId::from(id),
            Timestamp(format!("{}T06:00:00.000Z", date)),
            Timestamp(format!("{}T06:00:00.000Z", date)),
            data,
        )
    }

    #[test]
    fn test_requires_two_entries() {
        assert!(aggregate(&[]).is_none());
        assert!(aggregate(&[entry("a", "2024-05-01", &[])]).is_none());
    }

    #[test]
    fn test_identical_data_has_no_changes() {
        let a = entry("a", "2024-05-01", &[("climate_rh_avg", "70")]);
        let mut b = a.clone();
        b.id = EntryId::from("b");

        let stats = aggregate(&[a, b]).unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.compared_pairs, 1);
        assert_eq!(stats.avg_changes, 0.0);
        assert!(stats.top_fields.is_empty());
        assert_eq!(stats.per_entry.len(), 1);
        assert_eq!(stats.per_entry[0].count, 0);
    }

    #[test]
    fn test_counts_and_ordering() {
        let entries = vec![
            entry("a", "2024-05-01", &[("climate_rh_avg", "70"), ("notes", "x")]),
            entry("b", "2024-05-02", &[("climate_rh_avg", "72"), ("notes", "x")]),
            entry("c", "2024-05-03", &[("climate_rh_avg", "71"), ("notes", "y")]),
        ];
        let stats = aggregate(&entries).unwrap();

        assert_eq!(stats.compared_pairs, 2);
        // meta_date changes every pair too
        assert_eq!(stats.per_entry[0].fields, vec!["climate_rh_avg", "meta_date"]);
        assert_eq!(stats.per_entry[1].count, 3);
        assert!((stats.avg_changes - 2.5).abs() < 1e-9);

        assert_eq!(stats.top_fields[0].count, 2);
        assert_eq!(stats.top_fields[0].field, "climate_rh_avg");
        assert_eq!(stats.top_fields[0].label, "Rel. Luftfeuchte Durchschnitt");
        assert_eq!(stats.top_fields[1].field, "meta_date");
        assert_eq!(stats.top_fields[2].field, "notes");
        assert_eq!(stats.top_fields[2].count, 1);

        assert_eq!(stats.per_entry[1].id.as_str(), "c");
        assert_eq!(stats.per_entry[1].date, "2024-05-03");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let entries = vec![
            entry("a", "2024-05-01", &[]),
            entry("b", "2024-05-02", &[]),
            entry("c", "2024-05-03", &[]),
        ];
        let stats = aggregate(&entries).unwrap();
        let ids: Vec<_> = stats.recent(5).map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
