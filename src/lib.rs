//! # metricdb
//!
//! Time-series metric storage on an ordered key-value engine with:
//! - Order-preserving key encoding (range queries are sequential scans)
//! - Compact fixed-point value encoding, plus a legacy text encoding
//! - Range Get / Delete / DeleteTo under a named boundary policy
//! - A bundled LSM-style engine: Write-Ahead Logging, crash recovery,
//!   SSTables, single-writer/multi-reader concurrency
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MetricStore                             │
//! │          put / get / delete / delete_to / scan_all           │
//! └──────────────┬─────────────────────────────┬────────────────┘
//!                │                             │
//!                ▼                             ▼
//!         ┌─────────────┐              ┌──────────────┐
//!         │   Codecs    │◄─────────────│  RangeQuery  │
//!         │ text/binary │              │ (boundaries) │
//!         └─────────────┘              └──────┬───────┘
//!                                             │
//! ┌───────────────────────────────────────────▼─────────────────┐
//! │                    KvStore (Engine)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod horizon;
pub mod metric;
pub mod codec;
pub mod query;
pub mod store;
pub mod manifest;
pub mod migrate;

pub mod kv;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MetricError, Result};
pub use config::{Config, WalSyncStrategy};
pub use horizon::Horizon;
pub use metric::Metric;
pub use codec::{Encoding, MetricCodec};
pub use query::{BoundaryPolicy, Partial};
pub use store::MetricStore;
pub use migrate::{migrate, MigrationReport};
pub use kv::{KeyRange, KvStore, WriteBatch};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of metricdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
