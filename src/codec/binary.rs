//! Binary codec
//!
//! Fixed-width big-endian fields. Unsigned big-endian integers compare
//! bytewise the same way they compare numerically, so stamp order is kept.
//! The length prefix pins the exact name, so no name's keyspace can overlap
//! another's.

use bytes::{Buf, BufMut};

use crate::error::{MetricError, Result};
use crate::horizon::Horizon;

use super::rounding::{from_scaled, to_scaled, PRECISION};
use super::{Encoding, MetricCodec};

/// NameLen (4) + Offset (4)
const KEY_OVERHEAD: usize = 8;

/// Three i64 fixed-point fields
const VALUE_SIZE: usize = 24;

/// `len ++ name ++ offset` keys and fixed-point `i64` values
#[derive(Debug, Clone, Copy)]
pub struct BinaryCodec {
    horizon: Horizon,
}

impl BinaryCodec {
    pub fn new(horizon: Horizon) -> Self {
        Self { horizon }
    }
}

fn scaled(field: &str, x: f64) -> Result<i64> {
    if !x.is_finite() {
        return Err(MetricError::InvalidValue(format!("{} is {}", field, x)));
    }
    to_scaled(x, PRECISION).ok_or_else(|| {
        MetricError::InvalidValue(format!("{} {} exceeds fixed-point range", field, x))
    })
}

impl MetricCodec for BinaryCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Binary
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }

    fn encode_key(&self, name: &str, stamp: u32) -> Result<Vec<u8>> {
        let name_len = u32::try_from(name.len()).map_err(|_| {
            MetricError::InvalidValue(format!("name of {} bytes is too long", name.len()))
        })?;
        let offset = self.horizon.clamp_stamp(stamp) - self.horizon.epoch();

        let mut key = Vec::with_capacity(KEY_OVERHEAD + name.len());
        key.put_u32(name_len);
        key.put_slice(name.as_bytes());
        key.put_u32(offset);
        Ok(key)
    }

    fn decode_key(&self, key: &[u8]) -> Result<(String, u32)> {
        if key.len() < KEY_OVERHEAD {
            return Err(MetricError::Corrupted(format!(
                "key of {} bytes is shorter than {}",
                key.len(),
                KEY_OVERHEAD
            )));
        }

        let mut buf = key;
        let name_len = buf.get_u32() as usize;
        if buf.len() != name_len + 4 {
            return Err(MetricError::Corrupted(format!(
                "name length {} does not match key of {} bytes",
                name_len,
                key.len()
            )));
        }

        let name = String::from_utf8(buf[..name_len].to_vec())
            .map_err(|e| MetricError::Corrupted(format!("name is not UTF-8: {}", e)))?;
        buf.advance(name_len);

        let offset = buf.get_u32();
        let stamp = self.horizon.stamp_at(offset).ok_or_else(|| {
            MetricError::Corrupted(format!("stamp offset {} overflows u32", offset))
        })?;

        Ok((name, stamp))
    }

    fn owns_key(&self, name: &str, key: &[u8]) -> bool {
        let Ok(name_len) = u32::try_from(name.len()) else {
            return false;
        };
        key.len() == KEY_OVERHEAD + name.len()
            && key[..4] == name_len.to_be_bytes()
            && &key[4..4 + name.len()] == name.as_bytes()
    }

    fn encode_value(&self, value: f64, score: f64, average: f64) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(VALUE_SIZE);
        buf.put_i64(scaled("value", value)?);
        buf.put_i64(scaled("score", score)?);
        buf.put_i64(scaled("average", average)?);
        Ok(buf)
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<(f64, f64, f64)> {
        if bytes.len() != VALUE_SIZE {
            return Err(MetricError::Corrupted(format!(
                "value of {} bytes, expected {}",
                bytes.len(),
                VALUE_SIZE
            )));
        }

        let mut buf = bytes;
        let value = from_scaled(buf.get_i64(), PRECISION);
        let score = from_scaled(buf.get_i64(), PRECISION);
        let average = from_scaled(buf.get_i64(), PRECISION);
        Ok((value, score, average))
    }
}
