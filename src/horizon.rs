//! Horizon Policy
//!
//! Every dataset has a fixed epoch origin (the horizon). Stamps below it are
//! invalid, and stored keys carry `stamp - horizon` instead of the raw stamp.
//!
//! The horizon must never change for a dataset once data has been written:
//! doing so silently reinterprets every stored key. The engine-backed store
//! records it in the dataset manifest and refuses to reopen with another one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of the zero-padded timestamp-offset field in the text key encoding
pub const STAMP_LEN: usize = 7;

/// Radix of the timestamp-offset field in the text key encoding
pub const CONV_BASE: u32 = 36;

/// Epoch origin below which timestamps are invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Horizon(u32);

impl Horizon {
    /// Horizon used by datasets written with the legacy text encoding
    pub const LEGACY: Horizon = Horizon(1_450_322_633);

    pub const fn new(epoch: u32) -> Self {
        Self(epoch)
    }

    /// Seconds since the Unix epoch
    pub const fn epoch(&self) -> u32 {
        self.0
    }

    /// Whether `stamp` may be persisted under this horizon
    pub fn contains(&self, stamp: u32) -> bool {
        stamp >= self.0
    }

    /// `stamp - horizon`, or `None` for stamps below the horizon
    pub fn offset(&self, stamp: u32) -> Option<u32> {
        stamp.checked_sub(self.0)
    }

    /// Raise stamps below the horizon to the horizon itself
    pub fn clamp_stamp(&self, stamp: u32) -> u32 {
        stamp.max(self.0)
    }

    /// Inverse of [`Horizon::offset`]; `None` if the stamp would overflow
    pub fn stamp_at(&self, offset: u32) -> Option<u32> {
        self.0.checked_add(offset)
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self::LEGACY
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
