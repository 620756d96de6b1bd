//! Deduplicating locator heap
//!
//! One file per metric kind maps locator strings to stable offsets:
//!
//! ```text
//! +--------------------------+------------------------------------+
//! | 256 x u64 bucket heads   | {u16 len, bytes, u64 next} entries |
//! +--------------------------+------------------------------------+
//! 0                       INDEX_SIZE                            size
//! ```
//!
//! Each bucket head is 0 (empty) or the offset of the first entry in
//! that bucket's singly-linked chain; chains terminate at a next of 0.
//! Offset 0 falls inside the index region, so no real entry occupies it
//! and it doubles as the nil sentinel. Entries are immutable once
//! written and never removed.
//!
//! Inserting appends the new entry with `next = 0` first and patches the
//! predecessor link (or the bucket head) second. A crash between the two
//! writes strands the appended entry; the chain still terminates at 0
//! and a later insert of the same string appends a duplicate. That
//! window is accepted.

use crate::file::TableFile;
use metricio_common::{Error, Result};
use metricio_proto::PktBuf;
use std::path::Path;
use tracing::{debug, trace};

/// Number of hash buckets in the index region
pub const HASH_BUCKETS: usize = 256;

/// Byte size of the bucket index at the head of the file
pub const INDEX_SIZE: u64 = (HASH_BUCKETS * 8) as u64;

/// djb2 bucket for a locator string
#[must_use]
pub fn bucket(text: &[u8]) -> usize {
    let mut h: u32 = 5381;
    for &b in text {
        h = (h << 5).wrapping_add(h).wrapping_add(u32::from(b));
    }
    (h.wrapping_add(h >> 5) as usize) % HASH_BUCKETS
}

/// Hash-indexed append-only string heap
#[derive(Debug)]
pub struct LocatorHeap {
    file: TableFile,
}

impl LocatorHeap {
    /// Open a locator heap, writing a zeroed bucket index into a fresh
    /// file. A file shorter than the index region is corrupt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = TableFile::open(path)?;
        if file.size() == 0 {
            file.append(&[0u8; INDEX_SIZE as usize])?;
            debug!(path = %file.path().display(), "initialized locator index");
        } else if file.size() < INDEX_SIZE {
            return Err(Error::storage(format!(
                "locator file {} truncated inside the bucket index",
                file.path().display()
            )));
        }
        Ok(Self { file })
    }

    /// Total heap size in bytes
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.file.size()
    }

    fn read_u64(&self, offset: u64) -> Result<u64> {
        let mut out = [0u8; 8];
        self.file.read_exact_at(offset, &mut out)?;
        Ok(u64::from_be_bytes(out))
    }

    fn read_u16(&self, offset: u64) -> Result<u16> {
        let mut out = [0u8; 2];
        self.file.read_exact_at(offset, &mut out)?;
        Ok(u16::from_be_bytes(out))
    }

    /// Return the offset of `text`, appending it on first sight.
    ///
    /// Walks the bucket chain comparing length and bytes; a miss appends
    /// `{len, bytes, next = 0}` and then repoints the chain tail (or the
    /// empty bucket head) at the new entry.
    pub fn intern(&mut self, text: &[u8]) -> Result<u64> {
        if text.len() > usize::from(u16::MAX) {
            return Err(Error::TooLarge {
                len: text.len(),
                max: usize::from(u16::MAX),
            });
        }

        let slot = (bucket(text) * 8) as u64;
        let mut link = slot;
        let mut entry = self.read_u64(slot)?;
        while entry != 0 {
            let len = u64::from(self.read_u16(entry)?);
            if len == text.len() as u64 {
                let mut stored = vec![0u8; text.len()];
                self.file.read_exact_at(entry + 2, &mut stored)?;
                if stored == text {
                    trace!(offset = entry, "locator hit");
                    return Ok(entry);
                }
            }
            link = entry + 2 + len;
            entry = self.read_u64(link)?;
        }

        let mut buf = PktBuf::new(2 + text.len() + 8);
        buf.put_u16(text.len() as u16);
        buf.put_slice(text);
        buf.put_u64(0);
        let offset = self.file.append(buf.as_slice())?;
        self.file.write_at(link, &offset.to_be_bytes())?;
        trace!(offset, len = text.len(), "locator appended");
        Ok(offset)
    }

    /// Materialize the string at `offset`
    pub fn read(&self, offset: u64) -> Result<Vec<u8>> {
        if offset < INDEX_SIZE || offset + 2 > self.file.size() {
            return Err(Error::storage(format!(
                "locator offset {offset} out of bounds"
            )));
        }
        let len = u64::from(self.read_u16(offset)?);
        if offset + 2 + len > self.file.size() {
            return Err(Error::storage(format!(
                "locator entry at {offset} overruns the heap"
            )));
        }
        let mut text = vec![0u8; len as usize];
        self.file.read_exact_at(offset + 2, &mut text)?;
        Ok(text)
    }
}
