//! Metric record layout
//!
//! ```text
//! +------+-------+---------------+
//! | Time | Value | Locator index |
//! | 8B   | 8B    | 8B            |
//! +------+-------+---------------+
//! ```
//!
//! Records are fixed width, big-endian, and append-only. The locator
//! index is the entry's offset in the kind's locator heap.

use metricio_proto::PktBuf;

/// Encoded record size in bytes
pub const RECORD_SIZE: usize = 24;

/// One observation in a record log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub time: u64,
    pub value: u64,
    pub loc_index: u64,
}

impl Record {
    /// Encode into `buf` at the cursor
    pub fn encode(&self, buf: &mut PktBuf) {
        buf.put_u64(self.time);
        buf.put_u64(self.value);
        buf.put_u64(self.loc_index);
    }

    /// Decode from `buf` at the cursor. The caller ensures
    /// [`RECORD_SIZE`] unread bytes.
    pub fn decode(buf: &mut PktBuf) -> Self {
        Self {
            time: buf.get_u64(),
            value: buf.get_u64(),
            loc_index: buf.get_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let rec = Record {
            time: 0x0102,
            value: 0x0304,
            loc_index: 0x0506,
        };
        let mut buf = PktBuf::new(RECORD_SIZE);
        rec.encode(&mut buf);
        assert_eq!(buf.len(), RECORD_SIZE);
        assert_eq!(&buf.as_slice()[6..8], &[1, 2]);
        assert_eq!(&buf.as_slice()[14..16], &[3, 4]);
        assert_eq!(&buf.as_slice()[22..24], &[5, 6]);

        buf.rewind();
        assert_eq!(Record::decode(&mut buf), rec);
    }
}
