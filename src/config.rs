//! Configuration for metricdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::codec::Encoding;
use crate::horizon::Horizon;
use crate::query::BoundaryPolicy;

/// Main configuration for a metricdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── metricdb.meta    (dataset manifest: horizon + encoding)
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Dataset Configuration
    // -------------------------------------------------------------------------
    /// Epoch origin of the dataset. Fixed once data has been written.
    pub horizon: Horizon,

    /// Key/value byte layout. Fixed once data has been written.
    pub encoding: Encoding,

    /// Which window edges range queries include
    pub boundary: BoundaryPolicy,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./metricdb_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            horizon: Horizon::default(),
            encoding: Encoding::default(),
            boundary: BoundaryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the dataset horizon
    pub fn horizon(mut self, horizon: Horizon) -> Self {
        self.config.horizon = horizon;
        self
    }

    /// Set the key/value encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Set the range boundary policy
    pub fn boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.config.boundary = boundary;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
