//! Dataset Migration
//!
//! Copies every sample from one store into another. The two stores may use
//! different horizons or encodings; this is the only supported way to change
//! either for existing data.

use tracing::{debug, info};

use crate::error::Result;
use crate::kv::KvStore;
use crate::store::MetricStore;

/// Samples written per destination batch
pub const MIGRATION_BATCH: usize = 1024;

/// Outcome of a migration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Samples written to the destination
    pub copied: usize,

    /// Samples dropped because their stamp is below the destination horizon
    pub skipped_below_horizon: usize,
}

/// Copy all samples of `src` into `dst`
///
/// Each batch is atomic in `dst`; a failure part way leaves the batches
/// before it in place. Re-running is safe since puts overwrite.
pub fn migrate<S: KvStore, D: KvStore>(
    src: &MetricStore<S>,
    dst: &MetricStore<D>,
) -> Result<MigrationReport> {
    let (keep, skip): (Vec<_>, Vec<_>) = src
        .scan_all()?
        .into_iter()
        .partition(|m| dst.horizon().contains(m.stamp));

    for chunk in keep.chunks(MIGRATION_BATCH) {
        dst.put_batch(chunk)?;
        debug!(count = chunk.len(), "Migrated batch");
    }

    let report = MigrationReport {
        copied: keep.len(),
        skipped_below_horizon: skip.len(),
    };

    info!(
        from_horizon = %src.horizon(),
        from_encoding = %src.encoding(),
        to_horizon = %dst.horizon(),
        to_encoding = %dst.encoding(),
        copied = report.copied,
        skipped = report.skipped_below_horizon,
        "Migration complete"
    );
    Ok(report)
}
