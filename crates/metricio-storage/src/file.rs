//! Offset-addressed table files
//!
//! [`TableFile`] wraps one storage file with positional reads and writes
//! and a cached size, so appends need no seeking and concurrent readers
//! never move a shared cursor. [`Reader`] layers a buffered sequential
//! scan on top for walking fixed-width records.

use metricio_common::{Error, Result};
use metricio_proto::PktBuf;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read chunk size for sequential scans
pub const FILE_BUF_SIZE: usize = 4096;

/// One storage file with positional I/O and a cached size
#[derive(Debug)]
pub struct TableFile {
    file: File,
    path: PathBuf,
    size: u64,
}

impl TableFile {
    /// Open a table file, creating it if absent
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::storage(format!("cannot open {}: {e}", path.display())))?;
        let size = file
            .metadata()
            .map_err(|e| Error::storage(format!("cannot stat {}: {e}", path.display())))?
            .len();
        debug!(path = %path.display(), size, "opened table file");
        Ok(Self { file, path, size })
    }

    /// File path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached size in bytes, maintained across appends
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Append `data` at the end of the file, returning the offset it
    /// landed at. The cached size grows only after the write succeeded.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.size;
        self.file
            .write_all_at(data, offset)
            .map_err(|e| Error::storage(format!("append to {} failed: {e}", self.path.display())))?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    /// Overwrite `data` at an absolute offset within the existing file
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .map_err(|e| Error::storage(format!("write to {} failed: {e}", self.path.display())))?;
        let end = offset + data.len() as u64;
        if end > self.size {
            self.size = end;
        }
        Ok(())
    }

    /// Perform one positional read, returning the number of bytes read.
    /// Zero means end of file.
    pub fn read_at(&self, offset: u64, out: &mut [u8]) -> Result<usize> {
        self.file
            .read_at(out, offset)
            .map_err(|e| Error::storage(format!("read from {} failed: {e}", self.path.display())))
    }

    /// Fill `out` exactly from an absolute offset
    pub fn read_exact_at(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.file
            .read_exact_at(out, offset)
            .map_err(|e| Error::storage(format!("read from {} failed: {e}", self.path.display())))
    }

    /// Flush file data to disk
    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| Error::storage(format!("sync of {} failed: {e}", self.path.display())))
    }

    /// Start a buffered sequential scan at `offset`
    #[must_use]
    pub fn reader(&self, offset: u64) -> Reader<'_> {
        Reader {
            file: self,
            buf: PktBuf::new(FILE_BUF_SIZE),
            offset,
        }
    }
}

/// Buffered sequential reader over a [`TableFile`]
#[derive(Debug)]
pub struct Reader<'a> {
    file: &'a TableFile,
    buf: PktBuf,
    offset: u64,
}

impl Reader<'_> {
    /// Buffer at least `len` unread bytes. Returns `false` on a clean end
    /// of file, including one that cuts a trailing item short.
    pub fn ensure(&mut self, len: usize) -> Result<bool> {
        while self.buf.trailing_data() < len {
            if self.refill()? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn refill(&mut self) -> Result<usize> {
        self.buf.trim_head(self.buf.heading_data());
        self.buf.realign();
        let unread = self.buf.trailing_data();
        let mut chunk = [0u8; FILE_BUF_SIZE];
        let n = self.file.read_at(self.offset, &mut chunk)?;
        if n == 0 {
            return Ok(0);
        }
        self.offset += n as u64;
        // splice the chunk after the unread tail, then step back to it
        self.buf.forward(unread);
        self.buf.put_slice(&chunk[..n]);
        self.buf.backward(unread + n);
        Ok(n)
    }

    /// Buffered bytes, for decoding after a successful [`Reader::ensure`]
    pub fn buf(&mut self) -> &mut PktBuf {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_extends_cached_size() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t")).unwrap();
        assert_eq!(file.size(), 0);

        assert_eq!(file.append(b"abcd").unwrap(), 0);
        assert_eq!(file.append(b"efgh").unwrap(), 4);
        assert_eq!(file.size(), 8);

        let mut out = [0u8; 8];
        file.read_exact_at(0, &mut out).unwrap();
        assert_eq!(&out, b"abcdefgh");
    }

    #[test]
    fn test_size_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t");
        {
            let mut file = TableFile::open(&path).unwrap();
            file.append(&[0u8; 48]).unwrap();
        }
        let file = TableFile::open(&path).unwrap();
        assert_eq!(file.size(), 48);
    }

    #[test]
    fn test_write_at_backpatch() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t")).unwrap();
        file.append(&[0u8; 16]).unwrap();
        file.write_at(8, &7u64.to_be_bytes()).unwrap();
        assert_eq!(file.size(), 16);

        let mut out = [0u8; 8];
        file.read_exact_at(8, &mut out).unwrap();
        assert_eq!(u64::from_be_bytes(out), 7);
    }

    #[test]
    fn test_reader_spans_chunk_boundaries() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t")).unwrap();
        // three and a half chunks of counted u64 values
        let total = (FILE_BUF_SIZE * 7 / 2) / 8;
        for i in 0..total {
            file.append(&(i as u64).to_be_bytes()).unwrap();
        }

        let mut reader = file.reader(0);
        for i in 0..total {
            assert!(reader.ensure(8).unwrap());
            assert_eq!(reader.buf().get_u64(), i as u64);
        }
        assert!(!reader.ensure(8).unwrap());
    }

    #[test]
    fn test_reader_short_tail_is_clean_eof() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t")).unwrap();
        file.append(&[0u8; 11]).unwrap();

        let mut reader = file.reader(0);
        assert!(reader.ensure(8).unwrap());
        reader.buf().get_u64();
        // three bytes remain, not enough for another item
        assert!(!reader.ensure(8).unwrap());
    }
}
