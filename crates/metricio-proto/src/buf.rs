//! Byte cursor buffer
//!
//! A growable byte region with three offsets into it:
//!
//! ```text
//! +----------------+==================+==================+----------------+
//! | heading space  |   heading data   |  trailing data   | trailing space |
//! +----------------+==================+==================+----------------+
//! 0              start              cursor              end          capacity
//! ```
//!
//! `[start, end)` is the live data. The cursor is where typed reads and
//! writes happen. `reset(n)` places all three offsets at `n`, reserving
//! heading space so a header can be prepended after the body is built.
//! Invariant: `start <= cursor <= end <= capacity`.

use metricio_common::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Growable byte buffer with heading/trailing regions and a read/write
/// cursor. Typed accessors use big-endian byte order.
#[derive(Debug)]
pub struct PktBuf {
    data: Vec<u8>,
    start: usize,
    cursor: usize,
    end: usize,
}

impl PktBuf {
    /// Create a buffer with the given initial capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            start: 0,
            cursor: 0,
            end: 0,
        }
    }

    /// Current capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Live data length, `end - start`
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the buffer holds no live data
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Bytes between start and cursor (already consumed by the reader)
    #[must_use]
    pub const fn heading_data(&self) -> usize {
        self.cursor - self.start
    }

    /// Bytes between cursor and end (still unread)
    #[must_use]
    pub const fn trailing_data(&self) -> usize {
        self.end - self.cursor
    }

    /// Free bytes after end
    #[must_use]
    pub fn trailing_space(&self) -> usize {
        self.data.len() - self.end
    }

    /// Drop all data and reserve `heading` bytes of leading space for a
    /// header to be prepended later.
    pub fn reset(&mut self, heading: usize) {
        if heading > self.data.len() {
            self.data.resize(heading, 0);
        }
        self.start = heading;
        self.cursor = heading;
        self.end = heading;
    }

    /// Move the cursor back to the start of the live data
    pub const fn rewind(&mut self) {
        self.cursor = self.start;
    }

    /// Advance the cursor by `n` unread bytes
    ///
    /// # Panics
    /// Panics if fewer than `n` bytes remain before `end`.
    pub fn forward(&mut self, n: usize) {
        assert!(n <= self.trailing_data());
        self.cursor += n;
    }

    /// Move the cursor back by `n` bytes
    ///
    /// # Panics
    /// Panics if the cursor would move before `start`.
    pub fn backward(&mut self, n: usize) {
        assert!(n <= self.heading_data());
        self.cursor -= n;
    }

    /// Consume `n` bytes from the head of the live data. The cursor snaps
    /// forward if it fell behind the new start.
    ///
    /// # Panics
    /// Panics if fewer than `n` live bytes exist.
    pub fn trim_head(&mut self, n: usize) {
        assert!(n <= self.len());
        self.start += n;
        if self.cursor < self.start {
            self.cursor = self.start;
        }
    }

    /// Extend the live data backwards by `n` bytes into the heading space
    /// and place the cursor there, so a header can be written in front of
    /// an already-built body.
    ///
    /// # Panics
    /// Panics if less than `n` bytes of heading space were reserved.
    pub const fn prepend(&mut self, n: usize) {
        assert!(n <= self.start);
        self.start -= n;
        self.cursor = self.start;
    }

    /// Move the live data to offset 0, reclaiming heading space
    pub fn realign(&mut self) {
        self.data.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.cursor -= self.start;
        self.start = 0;
    }

    /// Live data, `[start, end)`
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Unread data, `[cursor, end)`
    #[must_use]
    pub fn current(&self) -> &[u8] {
        &self.data[self.cursor..self.end]
    }

    fn grow_for_put(&mut self, n: usize) {
        if self.cursor + n > self.data.len() {
            self.data.resize(self.cursor + n, 0);
        }
    }

    const fn advance_put(&mut self, n: usize) {
        self.cursor += n;
        if self.cursor > self.end {
            self.end = self.cursor;
        }
    }

    /// Write one byte at the cursor
    pub fn put_u8(&mut self, v: u8) {
        self.grow_for_put(1);
        self.data[self.cursor] = v;
        self.advance_put(1);
    }

    /// Write a big-endian u16 at the cursor
    pub fn put_u16(&mut self, v: u16) {
        self.put_slice(&v.to_be_bytes());
    }

    /// Write a big-endian u32 at the cursor
    pub fn put_u32(&mut self, v: u32) {
        self.put_slice(&v.to_be_bytes());
    }

    /// Write a big-endian u64 at the cursor
    pub fn put_u64(&mut self, v: u64) {
        self.put_slice(&v.to_be_bytes());
    }

    /// Write raw bytes at the cursor
    pub fn put_slice(&mut self, s: &[u8]) {
        self.grow_for_put(s.len());
        self.data[self.cursor..self.cursor + s.len()].copy_from_slice(s);
        self.advance_put(s.len());
    }

    /// Read one byte at the cursor
    ///
    /// # Panics
    /// Panics if no unread bytes remain. Callers check sizes before
    /// decoding, so an overrun is a programming error.
    pub fn get_u8(&mut self) -> u8 {
        assert!(self.trailing_data() >= 1);
        let v = self.data[self.cursor];
        self.cursor += 1;
        v
    }

    /// Read a big-endian u16 at the cursor
    pub fn get_u16(&mut self) -> u16 {
        u16::from_be_bytes(self.get_array())
    }

    /// Read a big-endian u32 at the cursor
    pub fn get_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.get_array())
    }

    /// Read a big-endian u64 at the cursor
    pub fn get_u64(&mut self) -> u64 {
        u64::from_be_bytes(self.get_array())
    }

    fn get_array<const N: usize>(&mut self) -> [u8; N] {
        assert!(self.trailing_data() >= N);
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.cursor..self.cursor + N]);
        self.cursor += N;
        out
    }

    /// Perform one read from `stream` into the trailing space, realigning
    /// (and growing if still full) first. Returns the number of bytes read;
    /// a zero-length read maps to [`Error::Closed`].
    pub async fn read_from<S>(&mut self, stream: &mut S) -> Result<usize>
    where
        S: AsyncRead + Unpin,
    {
        if self.trailing_space() == 0 {
            if self.start > 0 {
                self.realign();
            }
            if self.trailing_space() == 0 {
                let grown = self.data.len() * 2;
                self.data.resize(grown.max(1), 0);
            }
        }
        let n = stream.read(&mut self.data[self.end..]).await?;
        if n == 0 {
            return Err(Error::Closed);
        }
        self.end += n;
        Ok(n)
    }

    /// Perform one write of the live data to `stream`, trimming the bytes
    /// actually written from the head and leaving the remainder queued.
    pub async fn write_to<S>(&mut self, stream: &mut S) -> Result<usize>
    where
        S: AsyncWrite + Unpin,
    {
        if self.is_empty() {
            return Ok(0);
        }
        let n = stream.write(&self.data[self.start..self.end]).await?;
        if n == 0 {
            return Err(Error::Closed);
        }
        self.trim_head(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let mut buf = PktBuf::new(64);
        buf.put_u8(0xab);
        buf.put_u16(0x1234);
        buf.put_u32(0xdead_beef);
        buf.put_u64(0x0102_0304_0506_0708);
        buf.put_slice(b"host-1");

        buf.rewind();
        assert_eq!(buf.get_u8(), 0xab);
        assert_eq!(buf.get_u16(), 0x1234);
        assert_eq!(buf.get_u32(), 0xdead_beef);
        assert_eq!(buf.get_u64(), 0x0102_0304_0506_0708);
        assert_eq!(buf.current(), b"host-1");
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buf = PktBuf::new(8);
        buf.put_u16(0x0102);
        buf.put_u32(0x0304_0506);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_reset_and_prepend() {
        let mut buf = PktBuf::new(32);
        buf.reset(4);
        buf.put_u64(42);
        assert_eq!(buf.len(), 8);

        buf.prepend(4);
        buf.put_u32(0x0102_0304);
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf.as_slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(buf.trailing_data(), 8);
    }

    #[test]
    fn test_trim_head_snaps_cursor() {
        let mut buf = PktBuf::new(16);
        buf.put_u32(7);
        buf.rewind();
        buf.forward(2);
        buf.trim_head(3);
        assert_eq!(buf.heading_data(), 0);
        assert_eq!(buf.trailing_data(), 1);
    }

    #[test]
    fn test_realign_preserves_data() {
        let mut buf = PktBuf::new(16);
        buf.put_slice(b"abcdef");
        buf.rewind();
        buf.forward(2);
        buf.trim_head(2);
        buf.realign();
        assert_eq!(buf.as_slice(), b"cdef");
        assert_eq!(buf.heading_data(), 0);
    }

    #[test]
    fn test_put_grows_capacity() {
        let mut buf = PktBuf::new(2);
        buf.put_u64(1);
        buf.put_u64(2);
        assert_eq!(buf.len(), 16);
        buf.rewind();
        assert_eq!(buf.get_u64(), 1);
        assert_eq!(buf.get_u64(), 2);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_forward_past_end_panics() {
        let mut buf = PktBuf::new(8);
        buf.put_u8(1);
        buf.rewind();
        buf.forward(2);
    }

    #[tokio::test]
    async fn test_read_write_streams() {
        let mut out = PktBuf::new(16);
        out.put_slice(b"wire bytes");

        let (mut a, mut b) = tokio::io::duplex(64);
        while !out.is_empty() {
            out.write_to(&mut a).await.unwrap();
        }
        drop(a);

        let mut inb = PktBuf::new(4);
        let mut total = 0;
        loop {
            match inb.read_from(&mut b).await {
                Ok(n) => total += n,
                Err(Error::Closed) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(total, 10);
        assert_eq!(inb.as_slice(), b"wire bytes");
    }
}
