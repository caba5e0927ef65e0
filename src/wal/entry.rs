//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.
//!
//! ## Serialized Layout
//! ```text
//! ┌─────────┬─────────┬─────────┬──────────────────────┐
//! │ LSN (8) │ CRC (4) │ Len (4) │ bincode(WalEntry)    │
//! └─────────┴─────────┴─────────┴──────────────────────┘
//! ```
//! CRC covers the LSN bytes and the payload.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};

/// LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several operations applied atomically. Logged as one entry, so
    /// recovery replays all of them or none.
    Batch { ops: Vec<Operation> },
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize into header + payload bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            MetricError::Serialization(format!("WAL entry of {} bytes is too large", payload.len()))
        })?;
        let crc = Self::compute_crc(self.lsn, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize from header + payload bytes, verifying the checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = Self::parse_header(bytes)?;

        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + header.len)
            .ok_or_else(|| {
                MetricError::WalCorruption(format!(
                    "truncated payload: expected {} bytes, got {}",
                    header.len,
                    bytes.len() - HEADER_SIZE
                ))
            })?;

        let actual = Self::compute_crc(header.lsn, payload);
        if actual != header.crc {
            return Err(MetricError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:#010x}, got {:#010x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| MetricError::WalCorruption(format!("undecodable entry: {}", e)))?;

        if entry.lsn != header.lsn {
            return Err(MetricError::WalCorruption(format!(
                "header LSN {} does not match entry LSN {}",
                header.lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    pub(crate) fn parse_header(bytes: &[u8]) -> Result<EntryHeader> {
        if bytes.len() < HEADER_SIZE {
            return Err(MetricError::WalCorruption(format!(
                "header too small: {} bytes",
                bytes.len()
            )));
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(EntryHeader {
            lsn: buf.get_u64_le(),
            crc: buf.get_u32_le(),
            len: buf.get_u32_le() as usize,
        })
    }

    pub fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}

/// Fixed-size prefix of a serialized entry
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: usize,
}
