//! Metric Store
//!
//! The public facade: owns the engine handle and composes the codecs with
//! the range queries.
//!
//! ## Lifecycle
//! ```text
//! open ──► { put | put_batch | get | delete | delete_to | scan_all }* ──► close
//! ```
//! `close` consumes the store, so no operation can follow it.

use std::path::Path;

use tracing::debug;

use crate::codec::{Encoding, MetricCodec};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{MetricError, Result};
use crate::horizon::Horizon;
use crate::kv::{KeyRange, KvStore, WriteBatch};
use crate::manifest::Manifest;
use crate::metric::Metric;
use crate::query::{BoundaryPolicy, Partial, RangeQuery};

/// Time-series metrics on an ordered key-value engine
///
/// Synchronous: every call returns when the engine returns. The store adds
/// no locking of its own; it is `Send + Sync` because every `KvStore` is.
pub struct MetricStore<S: KvStore = Engine> {
    store: S,
    codec: Box<dyn MetricCodec>,
    boundary: BoundaryPolicy,
}

impl MetricStore<Engine> {
    /// Open or create a dataset backed by the bundled engine
    ///
    /// Fails with [`MetricError::Config`] if the dataset in
    /// `config.data_dir` was created with another horizon or encoding.
    pub fn open(config: Config) -> Result<Self> {
        Manifest::load_or_create(&config.data_dir, config.horizon, config.encoding)?;
        let engine = Engine::open(config.clone())?;
        Ok(Self::with_store(engine, &config))
    }

    /// Open with default settings in `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }
}

impl<S: KvStore> MetricStore<S> {
    /// Wrap any ordered key-value engine
    ///
    /// Only `horizon`, `encoding` and `boundary` of `config` are used.
    pub fn with_store(store: S, config: &Config) -> Self {
        Self {
            store,
            codec: config.encoding.codec(config.horizon),
            boundary: config.boundary,
        }
    }

    /// Persist one sample
    ///
    /// Fails with [`MetricError::StampTooSmall`] for stamps below the horizon
    /// and [`MetricError::InvalidValue`] for an empty name or fields the
    /// encoding cannot hold; nothing is written in either case.
    pub fn put(&self, metric: &Metric) -> Result<()> {
        let (key, value) = self.encode(metric)?;
        self.store.put(&key, &value)?;
        debug!(name = %metric.name, stamp = metric.stamp, "Put");
        Ok(())
    }

    /// Persist several samples atomically
    ///
    /// Every metric is validated before anything is written.
    pub fn put_batch(&self, metrics: &[Metric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::new();
        for metric in metrics {
            let (key, value) = self.encode(metric)?;
            batch.put(key, value);
        }
        self.store.write_batch(batch)?;
        debug!(count = metrics.len(), "Put batch");
        Ok(())
    }

    fn encode(&self, metric: &Metric) -> Result<(Vec<u8>, Vec<u8>)> {
        // A text key with no name cannot be split back into name and stamp
        if metric.name.is_empty() {
            return Err(MetricError::InvalidValue("metric name is empty".to_string()));
        }
        let horizon = self.codec.horizon();
        if !horizon.contains(metric.stamp) {
            return Err(MetricError::StampTooSmall {
                stamp: metric.stamp,
                horizon: horizon.epoch(),
            });
        }
        self.codec.encode_metric(metric)
    }

    /// Samples of `name` in `start..end` under the configured boundary
    /// policy, in ascending stamp order
    ///
    /// On a decode or engine failure the samples read so far are returned
    /// together with the error.
    pub fn get(&self, name: &str, start: u32, end: u32) -> Partial<Vec<Metric>> {
        self.query().get(&self.store, name, start, end)
    }

    /// Delete the samples `get` would return, as one atomic batch
    ///
    /// Returns the number of samples matched. Nothing is written when no
    /// sample matched. On error the count is not a reliable measure of what
    /// was removed.
    pub fn delete(&self, name: &str, start: u32, end: u32) -> Partial<usize> {
        self.query().delete(&self.store, name, start, end)
    }

    /// Delete every sample of `name` from the horizon (inclusive) to `end`
    pub fn delete_to(&self, name: &str, end: u32) -> Partial<usize> {
        self.query().delete_to(&self.store, name, end)
    }

    /// Every stored sample, ordered by key
    pub fn scan_all(&self) -> Result<Vec<Metric>> {
        self.store
            .scan(&KeyRange::all())?
            .map(|entry| {
                let (key, value) = entry?;
                self.codec.decode_metric(&key, &value)
            })
            .collect()
    }

    fn query(&self) -> RangeQuery<'_> {
        RangeQuery::new(self.codec.as_ref(), self.boundary)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Earliest storable stamp
    pub fn horizon(&self) -> Horizon {
        self.codec.horizon()
    }

    pub fn encoding(&self) -> Encoding {
        self.codec.encoding()
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    pub fn codec(&self) -> &dyn MetricCodec {
        self.codec.as_ref()
    }

    /// The underlying engine
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the engine
    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}
