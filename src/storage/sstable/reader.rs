//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and ordered range
//! scans via an in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Buf;
use parking_lot::Mutex;

use crate::error::{MetricError, Result};
use crate::kv::KeyRange;

use super::{SSTableEntry, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files
///
/// The file handle sits behind a mutex, so lookups and scans take `&self`
/// and many readers can share one `SSTableReader`.
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and the data block checksum, then loads the
    /// entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(MetricError::Storage(format!(
                "SSTable {} is too small ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let mut buf = &header[..];

        if &buf[..4] != MAGIC {
            return Err(MetricError::Storage(format!(
                "Invalid SSTable magic in {}: {:?}",
                path.display(),
                &buf[..4]
            )));
        }
        buf.advance(4);

        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(MetricError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }
        let entry_count = buf.get_u64_le();

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let mut buf = &footer[..];
        let index_offset = buf.get_u64_le();
        let data_crc = buf.get_u32_le();

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(MetricError::Storage(format!(
                "SSTable index offset {} out of bounds",
                index_offset
            )));
        }

        let actual = Self::data_checksum(&mut file, index_offset)?;
        if actual != data_crc {
            return Err(MetricError::Storage(format!(
                "SSTable {} checksum mismatch: expected {:#010x}, got {:#010x}",
                path.display(),
                data_crc,
                actual
            )));
        }

        let index_len = (file_size - FOOTER_SIZE - index_offset) as usize;
        let mut index_data = vec![0u8; index_len];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;
        let index = Self::parse_index(&index_data)?;

        if index.len() as u64 != entry_count {
            return Err(MetricError::Storage(format!(
                "SSTable header counts {} entries, index has {}",
                entry_count,
                index.len()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
        })
    }

    fn data_checksum(file: &mut File, index_offset: u64) -> Result<u32> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = file.take(index_offset - HEADER_SIZE);
        let mut hasher = crc32fast::Hasher::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let n = data.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
        }
        Ok(hasher.finalize())
    }

    /// [key_len(4)][offset(8)][key] repeated
    fn parse_index(mut buf: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
        let mut index = BTreeMap::new();
        while buf.has_remaining() {
            if buf.remaining() < 12 {
                return Err(MetricError::Storage("truncated SSTable index".to_string()));
            }
            let key_len = buf.get_u32_le() as usize;
            let offset = buf.get_u64_le();
            if buf.remaining() < key_len {
                return Err(MetricError::Storage("truncated SSTable index key".to_string()));
            }
            index.insert(buf[..key_len].to_vec(), offset);
            buf.advance(key_len);
        }
        Ok(index)
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = *self.index.get(key).ok_or(MetricError::KeyNotFound)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let (_, value) = read_entry(&mut *file)?;
        Ok(value)
    }

    /// Entries inside `range` in key order, tombstones included
    ///
    /// Seeks once to the first matching entry and reads the rest
    /// sequentially; matching entries are contiguous in the data block.
    pub fn scan(&self, range: &KeyRange) -> Result<Vec<SSTableEntry>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = self.index.range::<[u8], _>(range.as_bounds());
        let first = match matches.next() {
            Some((_, &offset)) => offset,
            None => return Ok(Vec::new()),
        };
        let count = 1 + matches.count();

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(first))?;
        (0..count).map(|_| read_entry(&mut *file)).collect()
    }

    /// Every entry in key order (for debugging and tests)
    pub fn entries(&self) -> Result<Vec<SSTableEntry>> {
        self.scan(&KeyRange::all())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Quick check if any key of `range` might be in this SSTable
    pub fn might_overlap(&self, range: &KeyRange) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => range.overlaps(min, max),
            _ => false,
        }
    }
}

/// Read one `[key_len][val_len][key][value]` entry at the current position
fn read_entry(reader: &mut impl Read) -> Result<SSTableEntry> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let mut buf = &header[..];
    let key_len = buf.get_u32_le() as usize;
    let val_len = buf.get_u32_le();

    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key)?;

    if val_len == TOMBSTONE_MARKER {
        return Ok((key, None));
    }

    let mut value = vec![0u8; val_len as usize];
    reader.read_exact(&mut value)?;
    Ok((key, Some(value)))
}
