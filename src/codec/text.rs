//! Text codec
//!
//! Byte-for-byte compatible with datasets written by the legacy store.

use crate::error::{MetricError, Result};
use crate::horizon::{Horizon, CONV_BASE, STAMP_LEN};

use super::rounding::{to_fixed, PRECISION};
use super::{Encoding, MetricCodec};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const DELIMITER: char = ':';

/// `name ++ base36(offset)` keys and `v:s:a` decimal values
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    horizon: Horizon,
}

impl TextCodec {
    pub fn new(horizon: Horizon) -> Self {
        Self { horizon }
    }
}

/// Zero-padded base-36 digits; 36^7 exceeds u32::MAX so every offset fits
fn encode_offset(mut offset: u32) -> [u8; STAMP_LEN] {
    let mut field = [b'0'; STAMP_LEN];
    let mut i = STAMP_LEN;
    while offset > 0 {
        i -= 1;
        field[i] = DIGITS[(offset % CONV_BASE) as usize];
        offset /= CONV_BASE;
    }
    field
}

fn decode_offset(field: &[u8]) -> Result<u32> {
    // from_str_radix would also accept a leading '+'
    if !field.iter().all(u8::is_ascii_alphanumeric) {
        return Err(MetricError::Corrupted(format!(
            "stamp field {:?} is not base-36",
            String::from_utf8_lossy(field)
        )));
    }
    let digits = std::str::from_utf8(field)
        .map_err(|e| MetricError::Corrupted(format!("stamp field: {}", e)))?;
    u32::from_str_radix(digits, CONV_BASE)
        .map_err(|e| MetricError::Corrupted(format!("stamp field {:?}: {}", digits, e)))
}

fn check_finite(field: &str, x: f64) -> Result<()> {
    if x.is_finite() {
        Ok(())
    } else {
        Err(MetricError::InvalidValue(format!("{} is {}", field, x)))
    }
}

fn parse_field(name: &str, s: &str) -> Result<f64> {
    let x: f64 = s
        .parse()
        .map_err(|_| MetricError::Corrupted(format!("{} field {:?} is not a number", name, s)))?;
    if !x.is_finite() {
        return Err(MetricError::Corrupted(format!("{} field {:?} is not finite", name, s)));
    }
    Ok(x)
}

impl MetricCodec for TextCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Text
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }

    fn encode_key(&self, name: &str, stamp: u32) -> Result<Vec<u8>> {
        let offset = self.horizon.clamp_stamp(stamp) - self.horizon.epoch();
        let mut key = Vec::with_capacity(name.len() + STAMP_LEN);
        key.extend_from_slice(name.as_bytes());
        key.extend_from_slice(&encode_offset(offset));
        Ok(key)
    }

    fn decode_key(&self, key: &[u8]) -> Result<(String, u32)> {
        if key.len() <= STAMP_LEN {
            return Err(MetricError::Corrupted(format!(
                "key of {} bytes has no room for a name",
                key.len()
            )));
        }

        // Positional split: the stamp is always the trailing field
        let (name, field) = key.split_at(key.len() - STAMP_LEN);
        let offset = decode_offset(field)?;
        let stamp = self.horizon.stamp_at(offset).ok_or_else(|| {
            MetricError::Corrupted(format!("stamp offset {} overflows u32", offset))
        })?;
        let name = String::from_utf8(name.to_vec())
            .map_err(|e| MetricError::Corrupted(format!("name is not UTF-8: {}", e)))?;

        Ok((name, stamp))
    }

    fn owns_key(&self, name: &str, key: &[u8]) -> bool {
        key.len() == name.len() + STAMP_LEN && key.starts_with(name.as_bytes())
    }

    fn encode_value(&self, value: f64, score: f64, average: f64) -> Result<Vec<u8>> {
        check_finite("value", value)?;
        check_finite("score", score)?;
        check_finite("average", average)?;

        let s = format!(
            "{}{d}{}{d}{}",
            to_fixed(value, PRECISION),
            to_fixed(score, PRECISION),
            to_fixed(average, PRECISION),
            d = DELIMITER,
        );
        Ok(s.into_bytes())
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<(f64, f64, f64)> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| MetricError::Corrupted(format!("value is not UTF-8: {}", e)))?;

        let fields: Vec<&str> = s.split(DELIMITER).collect();
        if fields.len() != 3 {
            return Err(MetricError::Corrupted(format!(
                "expected 3 value fields, found {}",
                fields.len()
            )));
        }

        Ok((
            parse_field("value", fields[0])?,
            parse_field("score", fields[1])?,
            parse_field("average", fields[2])?,
        ))
    }
}
