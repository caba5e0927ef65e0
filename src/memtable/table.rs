//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::MemTableEntry;
use crate::kv::KeyRange;
use crate::wal::Operation;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get an entry by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair, returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Value(value))
    }

    /// Delete a key by inserting a tombstone, returning the new approximate size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Tombstone)
    }

    /// Apply a logged operation, returning the new approximate size
    ///
    /// A batch is applied under a single write lock, so readers observe
    /// either none or all of it.
    pub fn apply(&self, operation: Operation) -> usize {
        let mut entries = Vec::new();
        flatten_into(operation, &mut entries);

        let mut data = self.data.write();
        for (key, entry) in entries {
            self.insert_locked(&mut data, key, entry);
        }
        self.size()
    }

    fn insert(&self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, entry);
        self.size()
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, MemTableEntry>,
        key: Vec<u8>,
        entry: MemTableEntry,
    ) {
        let key_len = key.len();
        let value_size = entry.size();
        match data.insert(key, entry) {
            Some(old) => {
                self.size.fetch_add(value_size, Ordering::SeqCst);
                self.size.fetch_sub(old.size(), Ordering::SeqCst);
            }
            None => {
                self.size.fetch_add(key_len + value_size, Ordering::SeqCst);
            }
        }
    }

    /// Entries whose key lies in `range`, in key order (tombstones included)
    pub fn range(&self, range: &KeyRange) -> Vec<(Vec<u8>, MemTableEntry)> {
        if range.is_empty() {
            return Vec::new();
        }
        self.data
            .read()
            .range::<[u8], _>(range.as_bounds())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> std::vec::IntoIter<(Vec<u8>, MemTableEntry)> {
        self.range(&KeyRange::all()).into_iter()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand an operation (and any nested batches) into memtable entries
fn flatten_into(operation: Operation, out: &mut Vec<(Vec<u8>, MemTableEntry)>) {
    match operation {
        Operation::Put { key, value } => out.push((key, MemTableEntry::Value(value))),
        Operation::Delete { key } => out.push((key, MemTableEntry::Tombstone)),
        Operation::Batch { ops } => {
            for op in ops {
                flatten_into(op, out);
            }
        }
    }
}
