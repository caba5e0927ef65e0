//! Dataset Manifest
//!
//! Records the horizon and encoding a dataset was created with, so that a
//! later open with different settings fails instead of silently
//! reinterpreting every stored key.
//!
//! ## File Format
//! ```text
//! ┌──────────────┬──────────────┬────────────────────────┐
//! │ CRC32 (4)    │ Length (4)   │ bincode(Manifest)      │
//! └──────────────┴──────────────┴────────────────────────┘
//! ```
//! Both integers are little-endian. The file is replaced atomically
//! (write to a temp file, fsync, rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Buf;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::Encoding;
use crate::error::{MetricError, Result};
use crate::horizon::Horizon;

/// Manifest file name inside the data directory
pub const MANIFEST_FILENAME: &str = "metricdb.meta";

/// Current manifest format version
pub const MANIFEST_VERSION: u16 = 1;

/// CRC (4) + Len (4)
const HEADER_SIZE: usize = 8;

/// Settings fixed for the lifetime of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u16,
    pub horizon: Horizon,
    pub encoding: Encoding,
}

impl Manifest {
    pub fn new(horizon: Horizon, encoding: Encoding) -> Self {
        Self {
            version: MANIFEST_VERSION,
            horizon,
            encoding,
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILENAME)
    }

    /// Read the manifest of `dir`, `Ok(None)` if there is none yet
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        if bytes.len() < HEADER_SIZE {
            return Err(MetricError::Corrupted(format!(
                "manifest {} is truncated",
                path.display()
            )));
        }

        let mut header = &bytes[..HEADER_SIZE];
        let stored_crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != len {
            return Err(MetricError::Corrupted(format!(
                "manifest length mismatch: header says {}, found {}",
                len,
                payload.len()
            )));
        }

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != stored_crc {
            return Err(MetricError::Corrupted(format!(
                "manifest CRC mismatch: expected {:#010x}, got {:#010x}",
                stored_crc, actual_crc
            )));
        }

        let manifest: Manifest = bincode::deserialize(payload)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(MetricError::Config(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }

        Ok(Some(manifest))
    }

    /// Atomically write the manifest into `dir`
    pub fn store(&self, dir: &Path) -> Result<()> {
        let payload = bincode::serialize(self)?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);

        let path = Self::path(dir);
        let tmp = path.with_extension("meta.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Check `dir` against the requested settings, recording them if the
    /// dataset is new
    ///
    /// Fails with [`MetricError::Config`] when the dataset was created with a
    /// different horizon or encoding.
    pub fn load_or_create(dir: &Path, horizon: Horizon, encoding: Encoding) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let requested = Self::new(horizon, encoding);

        match Self::load(dir)? {
            Some(existing) => {
                if existing.horizon != horizon {
                    return Err(MetricError::Config(format!(
                        "dataset horizon is {}, refusing to open with {}",
                        existing.horizon, horizon
                    )));
                }
                if existing.encoding != encoding {
                    return Err(MetricError::Config(format!(
                        "dataset encoding is {}, refusing to open with {}",
                        existing.encoding, encoding
                    )));
                }
                Ok(existing)
            }
            None => {
                requested.store(dir)?;
                info!(dir = %dir.display(), %horizon, %encoding, "Created dataset manifest");
                Ok(requested)
            }
        }
    }
}
