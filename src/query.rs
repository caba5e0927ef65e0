//! Range Queries
//!
//! Turns a `(name, start, end)` window into a key range and drives an engine
//! scan over it to implement Get and Delete.
//!
//! ## Boundary Policies
//! ```text
//! stamps:        start                     end
//!                  │                        │
//! HalfOpen         [========================)     start kept, end dropped
//! LeftOpenRight    (========================]     start dropped, end kept
//! ```
//! Stamps below the horizon cannot be stored, so a window starting below it
//! is clamped to the horizon, which is then always an inclusive edge.
//!
//! ## Partial Results
//! Get and Delete stop at the first failure and hand back what they had
//! gathered so far together with the error; see [`Partial`].

use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::MetricCodec;
use crate::error::{MetricError, Result};
use crate::horizon::Horizon;
use crate::kv::{KeyRange, KvStore, WriteBatch};
use crate::metric::Metric;

// =============================================================================
// Boundary Policy
// =============================================================================

/// Which edges of a `(start, end)` window a range query includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// `[start, end)`
    #[default]
    HalfOpen,

    /// `(start, end]`
    LeftOpenRightClosed,
}

impl BoundaryPolicy {
    /// Stamps of the window `start..end`, or `None` if it cannot hold any
    /// storable stamp
    pub fn window(self, horizon: Horizon, start: u32, end: u32) -> Option<StampWindow> {
        match self {
            BoundaryPolicy::HalfOpen => {
                let start = horizon.clamp_stamp(start);
                let end = horizon.clamp_stamp(end);
                (end > start).then_some(StampWindow {
                    lower: Bound::Included(start),
                    upper: Bound::Excluded(end),
                })
            }
            BoundaryPolicy::LeftOpenRightClosed => {
                if end < horizon.epoch() || end <= start {
                    return None;
                }
                let lower = if start < horizon.epoch() {
                    Bound::Included(horizon.epoch())
                } else {
                    Bound::Excluded(start)
                };
                Some(StampWindow {
                    lower,
                    upper: Bound::Included(end),
                })
            }
        }
    }

    /// Stamps from the horizon (always included) up to `end`, whose
    /// inclusion follows the policy
    pub fn window_to(self, horizon: Horizon, end: u32) -> Option<StampWindow> {
        let lower = Bound::Included(horizon.epoch());
        match self {
            BoundaryPolicy::HalfOpen => (end > horizon.epoch()).then_some(StampWindow {
                lower,
                upper: Bound::Excluded(end),
            }),
            BoundaryPolicy::LeftOpenRightClosed => horizon.contains(end).then_some(StampWindow {
                lower,
                upper: Bound::Included(end),
            }),
        }
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::HalfOpen => f.write_str("half-open"),
            BoundaryPolicy::LeftOpenRightClosed => f.write_str("left-open"),
        }
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "half-open" => Ok(BoundaryPolicy::HalfOpen),
            "left-open" => Ok(BoundaryPolicy::LeftOpenRightClosed),
            other => Err(format!(
                "unknown boundary policy '{}' (expected half-open or left-open)",
                other
            )),
        }
    }
}

/// A non-empty interval of stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampWindow {
    pub lower: Bound<u32>,
    pub upper: Bound<u32>,
}

impl StampWindow {
    pub fn contains(&self, stamp: u32) -> bool {
        let above = match self.lower {
            Bound::Included(lo) => stamp >= lo,
            Bound::Excluded(lo) => stamp > lo,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(hi) => stamp <= hi,
            Bound::Excluded(hi) => stamp < hi,
            Bound::Unbounded => true,
        };
        above && below
    }
}

// =============================================================================
// Partial Results
// =============================================================================

/// Outcome of an operation that may fail part way through
///
/// `value` holds whatever was gathered before `error` occurred. For Delete,
/// an error means the number of removed samples is unknown and must be
/// re-verified by the caller.
#[derive(Debug)]
#[must_use]
pub struct Partial<T> {
    pub value: T,
    pub error: Option<MetricError>,
}

impl<T> Partial<T> {
    pub fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn failed(value: T, error: MetricError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Discard the partial value on error
    pub fn into_result(self) -> Result<T> {
        match self.error {
            None => Ok(self.value),
            Some(e) => Err(e),
        }
    }

    pub fn into_parts(self) -> (T, Option<MetricError>) {
        (self.value, self.error)
    }
}

// =============================================================================
// Range Query
// =============================================================================

/// Get/Delete over one name's samples, for a given codec and policy
pub struct RangeQuery<'a> {
    codec: &'a dyn MetricCodec,
    boundary: BoundaryPolicy,
}

impl<'a> RangeQuery<'a> {
    pub fn new(codec: &'a dyn MetricCodec, boundary: BoundaryPolicy) -> Self {
        Self { codec, boundary }
    }

    /// Key range holding `name`'s samples in `window`
    pub fn key_range(&self, name: &str, window: &StampWindow) -> Result<KeyRange> {
        Ok(KeyRange::new(
            self.key_bound(name, window.lower)?,
            self.key_bound(name, window.upper)?,
        ))
    }

    fn key_bound(&self, name: &str, bound: Bound<u32>) -> Result<Bound<Vec<u8>>> {
        Ok(match bound {
            Bound::Included(stamp) => Bound::Included(self.codec.encode_key(name, stamp)?),
            Bound::Excluded(stamp) => Bound::Excluded(self.codec.encode_key(name, stamp)?),
            Bound::Unbounded => Bound::Unbounded,
        })
    }

    /// Samples of `name` in the window, in ascending stamp order
    pub fn get<S: KvStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        start: u32,
        end: u32,
    ) -> Partial<Vec<Metric>> {
        let window = self.boundary.window(self.codec.horizon(), start, end);
        let mut metrics = Vec::new();

        let range = match window.map(|w| self.key_range(name, &w)).transpose() {
            Ok(Some(range)) => range,
            Ok(None) => return Partial::ok(metrics),
            Err(e) => return Partial::failed(metrics, e),
        };

        let entries = match store.scan(&range) {
            Ok(entries) => entries,
            Err(e) => return Partial::failed(metrics, e),
        };

        for entry in entries {
            let (key, value) = match entry {
                Ok(kv) => kv,
                Err(e) => return Partial::failed(metrics, e),
            };
            if !self.codec.owns_key(name, &key) {
                continue;
            }
            match self.codec.decode_metric(&key, &value) {
                Ok(metric) => metrics.push(metric),
                Err(e) => return Partial::failed(metrics, e),
            }
        }

        debug!(name, start, end, found = metrics.len(), "Get");
        Partial::ok(metrics)
    }

    /// Delete `name`'s samples in the window, returning how many matched
    pub fn delete<S: KvStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        start: u32,
        end: u32,
    ) -> Partial<usize> {
        let window = self.boundary.window(self.codec.horizon(), start, end);
        self.delete_window(store, name, window)
    }

    /// Delete `name`'s samples from the horizon up to `end`
    pub fn delete_to<S: KvStore + ?Sized>(&self, store: &S, name: &str, end: u32) -> Partial<usize> {
        let window = self.boundary.window_to(self.codec.horizon(), end);
        self.delete_window(store, name, window)
    }

    fn delete_window<S: KvStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        window: Option<StampWindow>,
    ) -> Partial<usize> {
        let range = match window.map(|w| self.key_range(name, &w)).transpose() {
            Ok(Some(range)) => range,
            Ok(None) => return Partial::ok(0),
            Err(e) => return Partial::failed(0, e),
        };

        let entries = match store.scan(&range) {
            Ok(entries) => entries,
            Err(e) => return Partial::failed(0, e),
        };

        let mut batch = WriteBatch::new();
        for entry in entries {
            match entry {
                Ok((key, _)) if self.codec.owns_key(name, &key) => batch.delete(key),
                Ok(_) => {}
                Err(e) => return Partial::failed(batch.len(), e),
            }
        }

        let count = batch.len();
        if count == 0 {
            return Partial::ok(0);
        }

        debug!(name, count, "Deleting samples");
        match store.write_batch(batch) {
            Ok(()) => Partial::ok(count),
            Err(e) => Partial::failed(count, e),
        }
    }
}
