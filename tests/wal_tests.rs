//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Entry serialization and checksum validation
//! - Writer LSN assignment, sync strategies and truncation
//! - Reader iteration and torn-tail detection
//! - Recovery from partial writes and corrupted entries
//! - Batches logged as a single entry

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use metricdb::config::WalSyncStrategy;
use metricdb::wal::{Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use metricdb::MetricError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_serialize_layout() {
    let entry = WalEntry::new(7, put("k", "v"));
    let bytes = entry.serialize().unwrap();

    assert!(bytes.len() > HEADER_SIZE);
    assert_eq!(&bytes[..8], &7u64.to_le_bytes());

    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
}

#[test]
fn test_entry_deserialize_preserves_batch() {
    let batch = Operation::Batch {
        ops: vec![
            put("a", "1"),
            Operation::Delete {
                key: b"b".to_vec(),
            },
        ],
    };
    let entry = WalEntry::new(3, batch.clone());

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded.lsn, 3);
    assert_eq!(decoded.operation, batch);
}

#[test]
fn test_entry_crc_mismatch() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = WalEntry::deserialize(&bytes);

    assert!(matches!(result, Err(MetricError::WalCorruption(_))));
}

#[test]
fn test_entry_lsn_is_covered_by_crc() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    bytes[0] = 2;

    assert!(matches!(
        WalEntry::deserialize(&bytes),
        Err(MetricError::WalCorruption(_))
    ));
}

#[test]
fn test_entry_header_too_small() {
    assert!(matches!(
        WalEntry::deserialize(&[0u8; 4]),
        Err(MetricError::WalCorruption(_))
    ));
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(put("b", "2")).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_writer_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 4);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(put("next", "x")).unwrap(), 5);
}

#[test]
fn test_writer_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();
    assert_eq!(writer.unsynced_entries(), 2);

    writer.append(put("c", "3")).unwrap();
    assert_eq!(writer.unsynced_entries(), 0);
}

#[test]
fn test_writer_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put("a", "1")).unwrap();

    assert_eq!(writer.unsynced_entries(), 0);
}

#[test]
fn test_writer_truncate_resets() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();

    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.current_lsn(), 1);

    // Appending after truncate starts a fresh log
    writer.append(put("c", "3")).unwrap();
    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 1);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_iterates_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let reader = WalReader::open(&wal_path).unwrap();
    let entries: Vec<WalEntry> = reader.entries().collect::<Result<_, _>>().unwrap();

    let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_reader_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_reader_torn_payload_is_io_error() {
    let (_temp, wal_path) = setup_temp_wal();
    let bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    fs::write(&wal_path, &bytes[..bytes.len() - 3]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(matches!(reader.next_entry(), Err(MetricError::Io(_))));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_partial_header_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let valid_len = fs::metadata(&wal_path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; 8]).unwrap();
    file.sync_all().unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), valid_len);
}

#[test]
fn test_recover_corrupted_entry_stops_replay() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut bytes = Vec::new();
    for lsn in 1..=3 {
        bytes.extend(WalEntry::new(lsn, put("k", "v")).serialize().unwrap());
    }
    let first_len = bytes.len() / 3;
    // Flip a payload byte of the second entry
    bytes[first_len + HEADER_SIZE + 1] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), first_len as u64);
}

#[test]
fn test_recover_drops_torn_batch_whole() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("before", "1")).unwrap();
        writer
            .append(Operation::Batch {
                ops: vec![put("x", "1"), put("y", "2"), put("z", "3")],
            })
            .unwrap();
    }

    // Cut the batch entry in half
    let len = fs::metadata(&wal_path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&wal_path)
        .unwrap()
        .set_len(len - 10)
        .unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, put("before", "1"));
    assert!(result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1u8; 5]).unwrap();
    let len = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 3);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len);
}
