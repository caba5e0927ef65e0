//! Codec Module
//!
//! Maps a metric's identity and time to an order-preserving byte key, and its
//! three numeric fields to a compact byte value.
//!
//! ## Key Layouts
//! ```text
//! Text:   ┌──────────────┬──────────────────────────────────────┐
//!         │ Name (raw)   │ base36(stamp - horizon), 7 chars, 0-pad │
//!         └──────────────┴──────────────────────────────────────┘
//! Binary: ┌──────────────┬──────────────┬──────────────────────────┐
//!         │ NameLen (4)  │ Name (raw)   │ stamp - horizon (4, BE)  │
//!         └──────────────┴──────────────┴──────────────────────────┘
//! ```
//!
//! ## Value Layouts
//! ```text
//! Text:   "{value:.5}:{score:.5}:{average:.5}"
//! Binary: ┌────────────────┬────────────────┬────────────────┐
//!         │ value*1e5 (8)  │ score*1e5 (8)  │ average*1e5 (8)│  i64, BE
//!         └────────────────┴────────────────┴────────────────┘
//! ```
//!
//! For a fixed name both key layouts sort by stamp, which turns "all samples
//! of a name inside a window" into one contiguous key range.

mod binary;
pub mod rounding;
mod text;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::horizon::Horizon;
use crate::metric::Metric;

pub use binary::BinaryCodec;
pub use text::TextCodec;

/// Persisted key/value layout of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Base-36 stamp suffix and colon-joined decimal strings. Bit-exact with
    /// datasets written by the legacy store.
    Text,

    /// Length-prefixed name, big-endian offset, fixed-point integers
    #[default]
    Binary,
}

impl Encoding {
    /// Build the codec for this encoding under `horizon`
    pub fn codec(self, horizon: Horizon) -> Box<dyn MetricCodec> {
        match self {
            Encoding::Text => Box::new(TextCodec::new(horizon)),
            Encoding::Binary => Box::new(BinaryCodec::new(horizon)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Text => f.write_str("text"),
            Encoding::Binary => f.write_str("binary"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Encoding::Text),
            "binary" => Ok(Encoding::Binary),
            other => Err(format!("unknown encoding '{}' (expected text or binary)", other)),
        }
    }
}

/// Bidirectional mapping between metrics and their persisted bytes
pub trait MetricCodec: Send + Sync + fmt::Debug {
    fn encoding(&self) -> Encoding;

    fn horizon(&self) -> Horizon;

    /// Encode `(name, stamp)` into a key. Stamps below the horizon are clamped
    /// to it, which is only meaningful for range bounds.
    fn encode_key(&self, name: &str, stamp: u32) -> Result<Vec<u8>>;

    fn decode_key(&self, key: &[u8]) -> Result<(String, u32)>;

    /// Whether `key` lies in `name`'s keyspace, without decoding the stamp
    fn owns_key(&self, name: &str, key: &[u8]) -> bool;

    fn encode_value(&self, value: f64, score: f64, average: f64) -> Result<Vec<u8>>;

    fn decode_value(&self, bytes: &[u8]) -> Result<(f64, f64, f64)>;

    fn encode_metric(&self, metric: &Metric) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = self.encode_key(&metric.name, metric.stamp)?;
        let value = self.encode_value(metric.value, metric.score, metric.average)?;
        Ok((key, value))
    }

    fn decode_metric(&self, key: &[u8], value: &[u8]) -> Result<Metric> {
        let (name, stamp) = self.decode_key(key)?;
        let (value, score, average) = self.decode_value(value)?;
        Ok(Metric {
            name,
            stamp,
            value,
            score,
            average,
        })
    }
}
