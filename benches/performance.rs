//! Performance benchmarks for the entry store and analytics.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use greenhouse_log::analytics::chronological;
use greenhouse_log::{
    aggregate, analyze_trends, diff, open_store, BackendPreference, EntryData, EntryId,
    EntryStore, FieldValue, LogEntry, Row, Scalar, StoreConfig, Timestamp, META_DATE,
    TREND_METRICS,
};
use tempfile::TempDir;

fn day_data(day: usize) -> EntryData {
    let mut data = EntryData::new();
    data.insert(
        META_DATE.into(),
        format!("2024-{:02}-{:02}", day / 28 % 12 + 1, day % 28 + 1).as_str().into(),
    );
    data.insert(
        "climate_inside_temp_avg".into(),
        Scalar::number(18.0 + (day % 7) as f64 * 0.5).into(),
    );
    data.insert(
        "climate_rh_avg".into(),
        format!("{},{}", 60 + day % 15, day % 10).as_str().into(),
    );
    data.insert("climate_co2_avg".into(), Scalar::from((800 + day % 200) as i64).into());
    data.insert("notes".into(), format!("Rundgang {}", day).as_str().into());

    let rows = (0..4)
        .map(|i| {
            let mut row = Row::new();
            row.insert("zone".into(), Scalar::text(format!("A{}", i)));
            row.insert("volume_l".into(), Scalar::text(format!("{}", 100 + (day + i) % 30)));
            row
        })
        .collect();
    data.insert("irrigation".into(), FieldValue::Rows(rows));
    data
}

fn history(len: usize) -> Vec<LogEntry> {
    (0..len)
        .map(|day| {
            let data = day_data(day);
            LogEntry::new(
                EntryId::from(format!("e{}", day)),
                Timestamp::now(),
                Timestamp::now(),
                data,
            )
        })
        .collect()
}

/// Benchmark a single diff of two consecutive days
fn bench_diff(c: &mut Criterion) {
    let a = day_data(1);
    let b = day_data(2);
    c.bench_function("diff_consecutive_days", |bench| {
        bench.iter(|| black_box(diff(&a, &b)));
    });
}

/// Benchmark statistics and trends with varying history sizes
fn bench_analytics(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");

    for len in [30, 365, 1000] {
        let entries = chronological(&history(len));

        group.bench_with_input(BenchmarkId::new("aggregate", len), &entries, |b, entries| {
            b.iter(|| black_box(aggregate(entries)));
        });

        group.bench_with_input(BenchmarkId::new("trends", len), &entries, |b, entries| {
            b.iter(|| black_box(analyze_trends(entries, TREND_METRICS)));
        });
    }

    group.finish();
}

/// Benchmark durable saves and full reads on both backends
fn bench_store(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("store");
    group.sample_size(20);

    for backend in [BackendPreference::Indexed, BackendPreference::Flat] {
        let label = format!("{:?}", backend);
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            backend,
            ..StoreConfig::at(dir.path().join("store"))
        };
        let store: Box<dyn EntryStore> = open_store(&config);
        runtime.block_on(store.ready()).unwrap();

        let entries = history(200);
        for entry in &entries {
            runtime.block_on(store.save(entry.clone())).unwrap();
        }

        let mut i = 0usize;
        group.bench_function(BenchmarkId::new("save", &label), |b| {
            b.iter(|| {
                let entry = entries[i % entries.len()].clone();
                i += 1;
                runtime.block_on(store.save(entry)).unwrap();
            });
        });

        group.bench_function(BenchmarkId::new("get_all_200", &label), |b| {
            b.iter(|| black_box(runtime.block_on(store.get_all()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_analytics, bench_store);
criterion_main!(benches);
