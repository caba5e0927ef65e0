//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{MetricError, Result};

use super::entry::HEADER_SIZE;
use super::WalEntry;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last entry successfully read
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn tail (incomplete
    /// header or payload) is reported as an `UnexpectedEof` I/O error; a
    /// checksum failure as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let n = read_full(&mut self.reader, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_SIZE {
            return Err(torn(format!(
                "partial header at offset {}: {} of {} bytes",
                self.position, n, HEADER_SIZE
            )));
        }

        let parsed = WalEntry::parse_header(&header)?;
        let total = (HEADER_SIZE + parsed.len) as u64;

        // A garbage length must not drive a huge allocation
        if self.position + total > self.file_len {
            return Err(torn(format!(
                "partial entry at offset {}: needs {} bytes, {} remain",
                self.position,
                total,
                self.file_len - self.position
            )));
        }

        let mut bytes = Vec::with_capacity(total as usize);
        bytes.extend_from_slice(&header);
        bytes.resize(total as usize, 0);
        let m = read_full(&mut self.reader, &mut bytes[HEADER_SIZE..])?;
        if m < parsed.len {
            return Err(torn(format!(
                "partial payload at offset {}: {} of {} bytes",
                self.position, m, parsed.len
            )));
        }

        let entry = WalEntry::deserialize(&bytes)?;
        self.position += total;
        Ok(Some(entry))
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries. Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Whether `err` describes a torn write rather than corrupted content
pub(crate) fn is_torn(err: &MetricError) -> bool {
    matches!(err, MetricError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}

fn torn(msg: String) -> MetricError {
    MetricError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, msg))
}

/// Like `read_exact`, but reports how many bytes were available
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
