//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - Ordered range scans merging memtable and SSTables
//! - Atomic write batches
//! - Flush to SSTable
//! - Crash recovery from WAL
//! - Concurrent access patterns
//! - Engine lifecycle (open/close)

use std::fs;
use std::sync::Arc;
use std::thread;

use metricdb::config::{Config, WalSyncStrategy};
use metricdb::engine::Engine;
use metricdb::kv::{KeyRange, KvStore, WriteBatch};
use metricdb::Result;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(dir: &TempDir, memtable_size_limit: usize) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .memtable_size_limit(memtable_size_limit)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
    (temp_dir, engine)
}

fn scan_all(engine: &Engine, range: &KeyRange) -> Vec<(Vec<u8>, Vec<u8>)> {
    engine.scan(range).unwrap().collect::<Result<_>>().unwrap()
}

fn scan_keys(engine: &Engine, range: &KeyRange) -> Vec<String> {
    scan_all(engine, range)
        .into_iter()
        .map(|(k, _)| String::from_utf8(k).unwrap())
        .collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _engine = Engine::open(Config::builder().data_dir(&data_dir).build()).unwrap();

    assert!(data_dir.join("sstables").exists());
    assert!(data_dir.join("wal.log").exists());
}

#[test]
fn test_engine_put_get_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value1").unwrap();
    engine.put(b"key", b"value2").unwrap();
    assert_eq!(engine.get(b"key").unwrap(), Some(b"value2".to_vec()));

    engine.delete(b"key").unwrap();
    assert_eq!(engine.get(b"key").unwrap(), None);
    assert_eq!(engine.get(b"nonexistent").unwrap(), None);
}

#[test]
fn test_engine_binary_data() {
    let (_temp, engine) = setup_temp_engine();

    let key = b"\x00\x01\x02\xFF\xFE";
    let value = b"\xFF\x00\xAB\xCD\x00";

    engine.put(key, value).unwrap();
    assert_eq!(engine.get(key).unwrap(), Some(value.to_vec()));
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_engine_scan_in_key_order() {
    let (_temp, engine) = setup_temp_engine();
    for k in ["d", "a", "c", "b", "e"] {
        engine.put(k.as_bytes(), b"v").unwrap();
    }

    let keys = scan_keys(&engine, &KeyRange::half_open(b"b".to_vec(), b"e".to_vec()));

    assert_eq!(keys, vec!["b", "c", "d"]);
}

#[test]
fn test_engine_scan_across_flushes() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"1").unwrap();
    engine.flush().unwrap();
    engine.put(b"b", b"2").unwrap();
    engine.put(b"c", b"2").unwrap();
    engine.flush().unwrap();
    engine.delete(b"a").unwrap();
    engine.put(b"d", b"3").unwrap();

    assert_eq!(engine.sstable_count(), 2);
    assert_eq!(
        scan_all(&engine, &KeyRange::all()),
        vec![
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"2".to_vec()),
            (b"d".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn test_engine_scan_is_a_snapshot() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"a", b"1").unwrap();

    let iter = engine.scan(&KeyRange::all()).unwrap();
    engine.put(b"b", b"2").unwrap();
    let seen: Vec<_> = iter.collect::<Result<_>>().unwrap();

    assert_eq!(seen, vec![(b"a".to_vec(), b"1".to_vec())]);
}

#[test]
fn test_engine_scan_empty_range() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"a", b"1").unwrap();
    engine.flush().unwrap();

    assert!(scan_all(&engine, &KeyRange::half_open(b"z".to_vec(), b"a".to_vec())).is_empty());
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_engine_write_batch() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"old", b"x").unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"new1".to_vec(), b"1".to_vec());
    batch.put(b"new2".to_vec(), b"2".to_vec());
    batch.delete(b"old".to_vec());
    engine.write_batch(batch).unwrap();

    assert_eq!(engine.get(b"old").unwrap(), None);
    assert_eq!(scan_keys(&engine, &KeyRange::all()), vec!["new1", "new2"]);
    // One put, one batch
    assert_eq!(engine.writes_committed(), 2);
    assert_eq!(engine.current_lsn(), 3);
}

#[test]
fn test_engine_batch_recovered_after_crash() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        let mut batch = WriteBatch::new();
        for i in 0..10 {
            batch.put(format!("k{}", i).into_bytes(), b"v".to_vec());
        }
        engine.write_batch(batch).unwrap();
        drop(engine); // Crash
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(scan_all(&engine, &KeyRange::all()).len(), 10);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_engine_manual_flush() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.flush().unwrap();

    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn test_engine_flush_empty_memtable() {
    let (_temp, engine) = setup_temp_engine();

    engine.flush().unwrap();

    assert_eq!(engine.sstable_count(), 0);
}

#[test]
fn test_engine_auto_flush_on_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 100)).unwrap();

    for i in 0..10 {
        let key = format!("key{:02}", i);
        let value = format!("value_that_is_definitely_long_enough_{:02}", i);
        engine.put(key.as_bytes(), value.as_bytes()).unwrap();
    }

    assert!(engine.sstable_count() >= 1);
    assert_eq!(scan_all(&engine, &KeyRange::all()).len(), 10);
}

// =============================================================================
// Crash Recovery Tests
// =============================================================================

#[test]
fn test_engine_recovery_from_wal() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"key1", b"value1").unwrap();
        engine.put(b"key2", b"value2").unwrap();
        engine.delete(b"key1").unwrap();
        engine.put(b"key3", b"value3").unwrap();
        drop(engine); // Don't call close() - simulating crash
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    // Recovered data is flushed to an SSTable and the WAL restarts
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.current_lsn(), 1);
    assert_eq!(engine.get(b"key1").unwrap(), None);
    assert_eq!(engine.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(engine.get(b"key3").unwrap(), Some(b"value3".to_vec()));
}

#[test]
fn test_engine_no_data_loss_after_repeated_recovery() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"key", b"value").unwrap();
    }
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
    assert_eq!(engine.sstable_count(), 1);
}

#[test]
fn test_engine_recovers_after_interrupted_flush() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"x", b"1").unwrap();
        drop(engine); // Crash
    }
    // Crash while the first flush was half written
    let leftover = temp_dir.path().join("sstables").join("sstable_000001.sst.tmp");
    fs::write(&leftover, b"\x41\x54\x4c\x53\x00\x01").unwrap();

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(engine.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.sstable_count(), 1);
    assert!(!leftover.exists());
}

#[test]
fn test_engine_write_survives_failed_flush() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 64)).unwrap();
    // A directory in the way makes the next SSTable impossible to create
    let blocker = engine.storage_dir().join("sstable_000001.sst.tmp");
    fs::create_dir(&blocker).unwrap();

    engine.put(b"key", &[7u8; 100]).unwrap();

    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(engine.get(b"key").unwrap(), Some(vec![7u8; 100]));

    fs::remove_dir(&blocker).unwrap();
    engine.flush().unwrap();
    drop(engine);

    let engine = Engine::open(config_for(&temp_dir, 64)).unwrap();
    assert_eq!(engine.get(b"key").unwrap(), Some(vec![7u8; 100]));
}

// =============================================================================
// Close/Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_close_flushes_data() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"key", b"value").unwrap();
        KvStore::close(engine).unwrap();
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
    assert_eq!(engine.sstable_count(), 1);
}

#[test]
fn test_engine_accessors() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_path_buf();
    let engine = Engine::open(config_for(&temp_dir, 1024)).unwrap();

    assert_eq!(engine.data_dir(), data_dir);
    assert_eq!(engine.storage_dir(), data_dir.join("sstables"));
    assert_eq!(engine.memtable_size(), 0);
    assert_eq!(engine.writes_committed(), 0);
    assert_eq!(engine.config().memtable_size_limit, 1024);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writes() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(config_for(&temp_dir, 2048)).unwrap());

    let mut handles = vec![];
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let key = format!("thread{}_key{:02}", t, i);
                engine.put(key.as_bytes(), b"value").unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.writes_committed(), 100);
    assert_eq!(scan_all(&engine, &KeyRange::all()).len(), 100);
}

#[test]
fn test_engine_scans_never_see_half_a_batch() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(config_for(&temp_dir, 512)).unwrap());

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for round in 0..100u32 {
                let mut batch = WriteBatch::new();
                for k in ["x1", "x2", "x3"] {
                    batch.put(k.as_bytes().to_vec(), round.to_be_bytes().to_vec());
                }
                engine.write_batch(batch).unwrap();
            }
        })
    };

    for _ in 0..100 {
        let items = scan_all(&engine, &KeyRange::all());
        assert!(items.is_empty() || items.len() == 3);
        assert!(items.windows(2).all(|w| w[0].1 == w[1].1));
    }
    writer.join().unwrap();
}
