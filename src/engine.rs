//! Engine Module
//!
//! The bundled ordered key-value engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Serve ordered range scans over a consistent snapshot
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::kv::{KeyRange, KvStore, ScanIter, WriteBatch};
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch/flush): hold `state_lock` exclusively
///   - Only ONE write operation at a time
///   - Must acquire: state_lock (write) → WAL → memtable → storage
///
/// - **Reads** (get/scan): hold `state_lock` shared
///   - Many concurrent readers
///   - A scan never observes half of a batch or a flush in progress
///   - SSTable readers use interior mutability, so StorageManager reads
///     only take its read lock
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Writers take it exclusively, readers shared
    state_lock: RwLock<()>,

    /// Number of write operations committed since open
    writes: AtomicU64,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL if it exists, flush the replayed data and
    ///    truncate the log
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        // Paths are derived from data_dir, not configurable
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let replayed = if wal_path.exists() {
            Self::replay_wal(&wal_path, &memtable)?
        } else {
            0
        };

        // Make recovered data durable in an SSTable before dropping the log
        if !memtable.is_empty() {
            info!(entries = memtable.entry_count(), "Flushing recovered entries to SSTable");
            storage.flush(&memtable)?;
            memtable.clear();
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if replayed > 0 {
            wal.truncate()?;
        }

        info!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            "Engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            state_lock: RwLock::new(()),
            writes: AtomicU64::new(0),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    fn replay_wal(wal_path: &Path, memtable: &MemTable) -> Result<u64> {
        let (entries, recovery) = WalRecovery::recover(wal_path)?;

        if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
            info!(
                recovered = recovery.entries_recovered,
                corrupted = recovery.entries_corrupted,
                last_lsn = recovery.last_lsn,
                "WAL recovery"
            );
        }

        for entry in entries {
            memtable.apply(entry.operation);
        }

        Ok(recovery.entries_recovered)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _state = self.state_lock.read();

        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }

        self.storage.get(key)
    }

    /// Iterate live entries in `range`, in ascending key order
    ///
    /// The result is materialized under the shared state lock, so it is a
    /// snapshot: writes committed after this call returns are not visible
    /// through the iterator.
    pub fn scan(&self, range: &KeyRange) -> Result<ScanIter<'_>> {
        let merged = {
            let _state = self.state_lock.read();

            // Newest first: memtable, then SSTables newest → oldest
            let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
                .memtable
                .range(range)
                .into_iter()
                .map(|(key, entry)| (key, entry.into_value()))
                .collect();
            self.storage.scan_into(range, &mut merged)?;
            merged
        };

        debug!(entries = merged.len(), "Range scan");

        // Tombstones shadow older values and are dropped last
        let live = merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| Ok((key, value))));
        Ok(Box::new(live))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.commit(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.commit(Operation::Delete { key: key.to_vec() })
    }

    /// Apply every operation in `batch` atomically
    ///
    /// The batch is a single WAL entry: after a crash it is replayed whole
    /// or not at all. An empty batch is a no-op and writes nothing.
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.commit(Operation::Batch {
            ops: batch.into_operations(),
        })
    }

    /// Steps:
    /// 1. Acquire state lock exclusively
    /// 2. Write to WAL (durability)
    /// 3. Apply to MemTable
    /// 4. Check if flush needed
    ///
    /// The write is committed once the WAL append succeeds. A failed flush
    /// after that is logged and retried on the next write or `flush`.
    fn commit(&self, operation: Operation) -> Result<()> {
        let _state = self.state_lock.write();

        let lsn = self.wal.lock().append(operation.clone())?;
        let new_size = self.memtable.apply(operation);
        self.writes.fetch_add(1, Ordering::SeqCst);

        debug!(lsn, memtable_size = new_size, "Committed write");

        if new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.flush_locked() {
                warn!(lsn, error = %e, "Flush failed; data stays in WAL and MemTable");
            }
        }

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _state = self.state_lock.write();
        self.flush_locked()
    }

    /// Internal flush implementation (called with state lock held)
    fn flush_locked(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;

        info!(data_dir = %self.config.data_dir.display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// LSN the next WAL append will receive
    pub fn current_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    /// Write operations committed since open (a batch counts once)
    pub fn writes_committed(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl KvStore for Engine {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Engine::put(self, key, value)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        Engine::write_batch(self, batch)
    }

    fn scan(&self, range: &KeyRange) -> Result<ScanIter<'_>> {
        Engine::scan(self, range)
    }

    fn close(self) -> Result<()> {
        Engine::close(self)
    }
}
