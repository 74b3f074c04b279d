//! Per-metric trend classification.

use super::chronology::normalize_date_for_sort;
use crate::fields::{humanize_field_name, TrendMetric};
use crate::normalize::numeric_field;
use crate::types::LogEntry;
use serde::Serialize;

/// Direction of a metric over the analyzed span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Steady,
}

impl TrendDirection {
    /// Presentation rank: rising, then falling, then steady.
    fn rank(self) -> u8 {
        match self {
            TrendDirection::Up => 0,
            TrendDirection::Down => 1,
            TrendDirection::Steady => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            TrendDirection::Up => '+',
            TrendDirection::Down => '-',
            TrendDirection::Steady => '~',
        }
    }
}

/// One observation of a metric.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendSample {
    pub value: f64,
    pub date: String,
    pub sort_key: String,
}

/// Trend of one metric.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub direction: TrendDirection,
    /// Last value minus first value.
    pub delta: f64,
    /// Last value minus the one before it.
    pub step_delta: f64,
    pub first_value: f64,
    pub last_value: f64,
    pub samples: usize,
    pub latest_date: String,
}

/// Ordered trends plus a count per direction.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrendReport {
    pub results: Vec<TrendResult>,
    pub up: usize,
    pub down: usize,
    pub steady: usize,
}

impl TrendReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Minimum absolute change that counts as a trend.
pub fn tolerance_for(metric: &TrendMetric, first_value: f64) -> f64 {
    if let Some(tolerance) = metric.tolerance.filter(|t| *t >= 0.0) {
        return tolerance;
    }
    match metric.unit.to_lowercase().as_str() {
        "#" | "min" => 0.75,
        "h" => 0.1,
        _ => (first_value.abs() * 0.03).max(0.2),
    }
}

/// Numeric samples of a metric, sorted by date. Entries without a finite
/// value are skipped.
pub fn collect_samples(metric: &TrendMetric, entries: &[LogEntry]) -> Vec<TrendSample> {
    let mut series: Vec<TrendSample> = entries
        .iter()
        .filter_map(|entry| {
            let value = numeric_field(&entry.data, metric.key)?;
            let date = sample_date(entry);
            Some(TrendSample {
                value,
                sort_key: normalize_date_for_sort(&date),
                date,
            })
        })
        .collect();
    series.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    series
}

fn sample_date(entry: &LogEntry) -> String {
    let date = entry.business_date();
    if !date.is_empty() {
        return date;
    }
    if !entry.created_at.is_empty() {
        return entry.created_at.as_str().to_string();
    }
    entry.updated_at.as_str().to_string()
}

/// Classify one metric; fewer than two samples yield `None`.
pub fn analyze_metric(metric: &TrendMetric, entries: &[LogEntry]) -> Option<TrendResult> {
    let series = collect_samples(metric, entries);
    if series.len() < 2 {
        return None;
    }

    let first = &series[0];
    let last = &series[series.len() - 1];
    let previous = &series[series.len() - 2];

    let delta = last.value - first.value;
    let step_delta = last.value - previous.value;
    let tolerance = tolerance_for(metric, first.value);

    let direction = if delta.abs() <= tolerance {
        TrendDirection::Steady
    } else if delta > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Some(TrendResult {
        key: metric.key.to_string(),
        label: humanize_field_name(metric.key),
        unit: metric.unit.to_string(),
        direction,
        delta,
        step_delta,
        first_value: first.value,
        last_value: last.value,
        samples: series.len(),
        latest_date: last.date.clone(),
    })
}

/// Rising first, then falling, then steady; larger moves first within a group.
pub fn order_for_presentation(results: &mut [TrendResult]) {
    results.sort_by(|a, b| {
        a.direction
            .rank()
            .cmp(&b.direction.rank())
            .then_with(|| b.delta.abs().total_cmp(&a.delta.abs()))
    });
}

/// Analyze every metric over `entries` and order the results.
pub fn analyze_trends(entries: &[LogEntry], metrics: &[TrendMetric]) -> TrendReport {
    let mut results: Vec<TrendResult> = metrics
        .iter()
        .filter_map(|metric| analyze_metric(metric, entries))
        .collect();
    order_for_presentation(&mut results);

    let mut report = TrendReport::default();
    for result in &results {
        match result.direction {
            TrendDirection::Up => report.up += 1,
            TrendDirection::Down => report.down += 1,
            TrendDirection::Steady => report.steady += 1,
        }
    }
    report.results = results;
    report
}
