//! Ordered key-value store interface
//!
//! The metric store only needs four capabilities from its engine: durable
//! put, ordered range scans over a consistent snapshot, atomic multi-key
//! batches and an explicit close. Any engine providing them can back a
//! [`MetricStore`](crate::MetricStore); [`Engine`](crate::Engine) is the
//! bundled one.

use std::ops::Bound;

use crate::error::Result;
use crate::wal::Operation;

/// A key-value pair returned by a scan
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Iterator over a scanned range, in ascending key order
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<KvPair>> + 'a>;

/// Ordered byte-string storage engine
pub trait KvStore: Send + Sync {
    /// Durably store a single key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Apply every operation of `batch` atomically
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// Iterate live entries inside `range` as of the call
    fn scan(&self, range: &KeyRange) -> Result<ScanIter<'_>>;

    /// Release the engine. Must be called exactly once.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

// =============================================================================
// Key Ranges
// =============================================================================

/// A range of byte keys with explicit bounds on both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub lower: Bound<Vec<u8>>,
    pub upper: Bound<Vec<u8>>,
}

impl KeyRange {
    pub fn new(lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> Self {
        Self { lower, upper }
    }

    /// `[lower, upper)`
    pub fn half_open(lower: Vec<u8>, upper: Vec<u8>) -> Self {
        Self::new(Bound::Included(lower), Bound::Excluded(upper))
    }

    /// Every key
    pub fn all() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// Borrowed bounds, suitable for `BTreeMap::range`
    pub fn as_bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (as_slice_bound(&self.lower), as_slice_bound(&self.upper))
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let above = match &self.lower {
            Bound::Included(lo) => key >= lo.as_slice(),
            Bound::Excluded(lo) => key > lo.as_slice(),
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(hi) => key <= hi.as_slice(),
            Bound::Excluded(hi) => key < hi.as_slice(),
            Bound::Unbounded => true,
        };
        above && below
    }

    /// True when no key can satisfy both bounds. `BTreeMap::range` panics on
    /// such ranges, so callers check this first.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }

    /// Whether this range can overlap keys in `[min, max]`
    pub fn overlaps(&self, min: &[u8], max: &[u8]) -> bool {
        let starts_after = match &self.lower {
            Bound::Included(lo) => lo.as_slice() > max,
            Bound::Excluded(lo) => lo.as_slice() >= max,
            Bound::Unbounded => false,
        };
        let ends_before = match &self.upper {
            Bound::Included(hi) => hi.as_slice() < min,
            Bound::Excluded(hi) => hi.as_slice() <= min,
            Bound::Unbounded => false,
        };
        !starts_after && !ends_before
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

// =============================================================================
// Write Batches
// =============================================================================

/// Operations committed together or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(Operation::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(Operation::Delete { key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_contains() {
        let range = KeyRange::half_open(b"b".to_vec(), b"d".to_vec());

        assert!(!range.contains(b"a"));
        assert!(range.contains(b"b"));
        assert!(range.contains(b"c"));
        assert!(!range.contains(b"d"));
    }

    #[test]
    fn test_is_empty() {
        assert!(KeyRange::half_open(b"b".to_vec(), b"b".to_vec()).is_empty());
        assert!(KeyRange::half_open(b"c".to_vec(), b"b".to_vec()).is_empty());
        assert!(!KeyRange::new(Bound::Included(b"b".to_vec()), Bound::Included(b"b".to_vec()))
            .is_empty());
        assert!(!KeyRange::all().is_empty());
    }

    #[test]
    fn test_overlaps() {
        let range = KeyRange::half_open(b"c".to_vec(), b"f".to_vec());

        assert!(range.overlaps(b"a", b"c"));
        assert!(range.overlaps(b"d", b"z"));
        assert!(!range.overlaps(b"a", b"b"));
        assert!(!range.overlaps(b"f", b"z"));
    }
}
