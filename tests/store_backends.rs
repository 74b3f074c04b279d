//! Behavior shared by both entry store backends, plus indexed-log recovery.

use greenhouse_log::{
    open_store, BackendKind, BackendPreference, EntryData, EntryId, EntryStore, FieldValue,
    FlatListStore, IndexedStore, KeyValueFile, LogEntry, Row, Scalar, StoreConfig, StoreError,
    Timestamp, META_DATE,
};
use greenhouse_log::storage::ENTRIES_KEY;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn indexed_config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        backend: BackendPreference::Indexed,
        ..StoreConfig::at(dir.path().join("store"))
    }
}

fn flat_config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        backend: BackendPreference::Flat,
        ..StoreConfig::at(dir.path().join("store"))
    }
}

async fn ready_store(config: &StoreConfig) -> Box<dyn EntryStore> {
    let store = open_store(config);
    store.ready().await.unwrap();
    store
}

fn full_entry(id: &str, date: &str) -> LogEntry {
    let mut irrigation = Row::new();
    irrigation.insert("zone".into(), Scalar::text("A1"));
    irrigation.insert("volume_l".into(), Scalar::number(120.5));
    irrigation.insert("ec".into(), Scalar::Null);

    let mut climate = Row::new();
    climate.insert("sensor".into(), Scalar::text("north"));
    climate.insert("ok".into(), Scalar::Bool(true));

    let mut data = EntryData::new();
    data.insert(META_DATE.into(), date.into());
    data.insert("meta_zone".into(), "Haus 2".into());
    data.insert("climate_inside_temp_avg".into(), "21,5".into());
    data.insert("co2_ppm".into(), Scalar::from(820i64).into());
    data.insert("vent_open".into(), false.into());
    data.insert("irrigation".into(), FieldValue::Rows(vec![irrigation]));
    data.insert(
        "crops".into(),
        FieldValue::Values(vec![Scalar::text("Tomate"), Scalar::text("Gurke")]),
    );
    data.insert("sensor_check".into(), FieldValue::Record(climate));
    data.insert("notes".into(), Scalar::Null.into());

    LogEntry::new(
        EntryId::from(id),
        Timestamp("2024-05-01T06:30:00.000Z".into()),
        Timestamp("2024-05-01T18:00:00.000Z".into()),
        data,
    )
}

async fn check_contract(store: &dyn EntryStore) {
    let entry = full_entry("2024-05-01-a", "2024-05-01");
    let saved = store.save(entry.clone()).await.unwrap();
    assert_eq!(saved, entry);
    assert_eq!(store.get("2024-05-01-a").await.unwrap(), Some(entry.clone()));
    assert_eq!(store.get("nope").await.unwrap(), None);

    let other = full_entry("2024-05-02-b", "2024-05-02");
    store.save(other.clone()).await.unwrap();
    let mut all = store.get_all().await.unwrap();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(all, vec![entry.clone(), other]);

    store.delete("2024-05-01-a").await.unwrap();
    store.delete("2024-05-01-a").await.unwrap();
    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all.iter().all(|e| e.id.as_str() != "2024-05-01-a"));
}

#[tokio::test]
async fn test_indexed_contract() {
    let dir = TempDir::new().unwrap();
    let store = ready_store(&indexed_config(&dir)).await;
    assert_eq!(store.backend(), BackendKind::Indexed);
    check_contract(store.as_ref()).await;
}

#[tokio::test]
async fn test_flat_contract() {
    let dir = TempDir::new().unwrap();
    let store = ready_store(&flat_config(&dir)).await;
    assert_eq!(store.backend(), BackendKind::Flat);
    check_contract(store.as_ref()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_keep_every_entry() {
    for backend in [BackendPreference::Indexed, BackendPreference::Flat] {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            backend,
            ..StoreConfig::at(dir.path().join("store"))
        };
        let store: Arc<dyn EntryStore> = Arc::from(ready_store(&config).await);

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("2024-05-01-{:02}", i);
                    store.save(full_entry(&id, "2024-05-01")).await?;
                    if i % 4 == 0 {
                        store.delete(&id).await?;
                    }
                    Ok::<_, StoreError>(())
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 24, "{:?}", backend);
        for i in 0..32 {
            let found = store.get(&format!("2024-05-01-{:02}", i)).await.unwrap();
            assert_eq!(found.is_some(), i % 4 != 0, "{:?} entry {}", backend, i);
        }
    }
}

#[tokio::test]
async fn test_operations_before_ready_fail() {
    let dir = TempDir::new().unwrap();
    for config in [indexed_config(&dir), flat_config(&dir)] {
        let store = open_store(&config);
        assert!(matches!(
            store.get("x").await,
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(
            store.delete("x").await,
            Err(StoreError::NotInitialized)
        ));
    }
}

#[tokio::test]
async fn test_indexed_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = indexed_config(&dir);

    {
        let store = ready_store(&config).await;
        store.save(full_entry("a", "2024-05-01")).await.unwrap();
        store.save(full_entry("b", "2024-05-02")).await.unwrap();
        store.save(full_entry("a", "2024-05-03")).await.unwrap();
        store.delete("b").await.unwrap();
    }

    let store = ready_store(&config).await;
    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].business_date(), "2024-05-03");
}

#[tokio::test]
async fn test_indexed_discards_torn_tail() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().unwrap();
    let config = indexed_config(&dir);

    {
        let store = ready_store(&config).await;
        store.save(full_entry("a", "2024-05-01")).await.unwrap();
    }

    // a frame header with nothing after it
    let log_path = config.path.join("entries.log");
    let intact = fs::metadata(&log_path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(b"ENT\0\x01\x00\x02\x00").unwrap();
    }

    let store = ready_store(&config).await;
    assert_eq!(store.get_all().await.unwrap().len(), 1);
    assert_eq!(fs::metadata(&log_path).unwrap().len(), intact);

    store.save(full_entry("b", "2024-05-02")).await.unwrap();
    assert_eq!(store.get_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_indexed_mid_log_damage_fails_ready() {
    let dir = TempDir::new().unwrap();
    let config = indexed_config(&dir);

    {
        let store = ready_store(&config).await;
        store.save(full_entry("a", "2024-05-01")).await.unwrap();
        store.save(full_entry("b", "2024-05-02")).await.unwrap();
    }

    let log_path = config.path.join("entries.log");
    let mut bytes = fs::read(&log_path).unwrap();
    // inside the payload of the first frame
    bytes[40] ^= 0x55;
    fs::write(&log_path, &bytes).unwrap();

    let store = IndexedStore::new(config);
    let err = store.ready().await.unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)));
}

#[tokio::test]
async fn test_indexed_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let config = indexed_config(&dir);

    let first = IndexedStore::new(config.clone());
    first.ready().await.unwrap();

    let second = IndexedStore::new(config.clone());
    assert!(matches!(second.ready().await, Err(StoreError::Locked)));

    drop(first);
    let third = IndexedStore::new(config);
    third.ready().await.unwrap();
}

#[tokio::test]
async fn test_indexed_compaction_under_churn() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        compact_after_dead_frames: 8,
        entry_cache_size: 2,
        ..indexed_config(&dir)
    };

    {
        let store = ready_store(&config).await;
        for round in 0..20 {
            for id in ["a", "b", "c"] {
                let date = format!("2024-05-{:02}", round + 1);
                store.save(full_entry(id, &date)).await.unwrap();
            }
        }
        store.delete("c").await.unwrap();
    }

    let log_len = fs::metadata(config.path.join("entries.log")).unwrap().len();
    let single = serde_json::to_vec(&full_entry("a", "2024-05-20")).unwrap().len() as u64;
    // far less than 60 saves' worth of frames
    assert!(log_len < single * 20);

    let store = ready_store(&config).await;
    let mut all = store.get_all().await.unwrap();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(all.iter().all(|e| e.business_date() == "2024-05-20"));
}

#[tokio::test]
async fn test_flat_corrupt_blob_is_read_error() {
    let dir = TempDir::new().unwrap();
    let config = flat_config(&dir);
    KeyValueFile::new(config.kv_path())
        .set(ENTRIES_KEY, "this is not json".into())
        .unwrap();

    let store = FlatListStore::new(config.kv_path());
    store.ready().await.unwrap();
    let err = store.get_all().await.unwrap_err();
    assert!(matches!(err, StoreError::Read(_)));

    // writes refuse to clobber the unreadable list
    let err = store.save(full_entry("a", "2024-05-01")).await.unwrap_err();
    assert!(matches!(err, StoreError::Write(_)));
}

#[tokio::test]
async fn test_auto_falls_back_to_flat_file() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("store");
    fs::write(&blocked, b"occupied").unwrap();

    let config = StoreConfig::at(&blocked);
    let store = ready_store(&config).await;
    assert_eq!(store.backend(), BackendKind::Flat);

    store.save(full_entry("a", "2024-05-01")).await.unwrap();
    assert!(config.kv_path().exists());
    assert_eq!(fs::read(&blocked).unwrap(), b"occupied");
}
