//! Frame header codec
//!
//! Every message travels as one frame: a fixed header prefixed to a
//! variable body, all integers big-endian.
//!
//! ```text
//! +---------+------+----------+------+
//! | Version | Type | Body len | Body |
//! | 1B      | 1B   | 2B       | var  |
//! +---------+------+----------+------+
//! ```
//!
//! Bodies are encoded first into a buffer reserved with [`HEADER_SIZE`]
//! bytes of heading space; the header is then prepended, so the body
//! length needs no second pass.

#![allow(clippy::cast_possible_truncation)]

use crate::buf::PktBuf;
use metricio_common::{Error, Result};
use tracing::{debug, error, trace};

/// Protocol version. There is no negotiation; a mismatch is fatal.
pub const VERSION: u8 = 1;

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 4;

/// Maximum frame size, header and body together
pub const MAX_FRAME_SIZE: usize = 4096;

/// Maximum body size
pub const MAX_BODY_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Frame type discriminants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Reserved, never sent
    Reserved = 0,
    /// Value/time predicate query
    Query = 1,
    /// One query result, or the stream terminator
    Response = 2,
    /// Append one record
    Add = 3,
    /// Record deletion, reserved and unimplemented
    Del = 4,
}

impl FrameType {
    /// Decode a wire discriminant
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Reserved),
            1 => Some(Self::Query),
            2 => Some(Self::Response),
            3 => Some(Self::Add),
            4 => Some(Self::Del),
            _ => None,
        }
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u8,
    pub frame_type: u8,
    pub body_len: usize,
}

/// Prepare `buf` for body encoding, reserving header space
pub fn begin(buf: &mut PktBuf) {
    buf.reset(HEADER_SIZE);
}

/// Prepend the header to a body built after [`begin`]. The buffer then
/// holds the complete frame.
pub fn finish(buf: &mut PktBuf, frame_type: FrameType) {
    let body_len = buf.len();
    debug_assert!(body_len <= MAX_BODY_SIZE);
    buf.prepend(HEADER_SIZE);
    buf.put_u8(VERSION);
    buf.put_u8(frame_type as u8);
    buf.put_u16(body_len as u16);
    trace!(frame = %hex::encode(buf.as_slice()), "encoded frame");
}

/// Decode one frame header from the inbound buffer.
///
/// Returns [`Error::Again`] while the header or the body is incomplete; on
/// a partial body the cursor is rewound so the next attempt re-parses the
/// header. On success the header bytes are consumed and the cursor sits at
/// the body.
pub fn decode(buf: &mut PktBuf) -> Result<Header> {
    if buf.trailing_data() < HEADER_SIZE {
        debug!("recv partial header");
        return Err(Error::Again);
    }
    let version = buf.get_u8();
    let frame_type = buf.get_u8();
    let body_len = buf.get_u16() as usize;
    trace!(
        frame = %hex::encode(&buf.as_slice()[..HEADER_SIZE + body_len.min(buf.trailing_data())]),
        "recv frame"
    );

    if version != VERSION {
        error!(local = VERSION, peer = version, "recv version mismatch");
        return Err(Error::VersionMismatch {
            local: VERSION,
            peer: version,
        });
    }
    if body_len > MAX_BODY_SIZE {
        error!(len = body_len, "recv too long frame");
        return Err(Error::TooLarge {
            len: body_len,
            max: MAX_BODY_SIZE,
        });
    }
    if buf.trailing_data() < body_len {
        debug!("recv partial body");
        buf.rewind();
        return Err(Error::Again);
    }
    buf.trim_head(buf.heading_data());
    Ok(Header {
        version,
        frame_type,
        body_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(frame_type: FrameType, body: &[u8]) -> Vec<u8> {
        let mut buf = PktBuf::new(64);
        begin(&mut buf);
        buf.put_slice(body);
        finish(&mut buf, frame_type);
        buf.as_slice().to_vec()
    }

    #[test]
    fn test_encode_layout() {
        let bytes = frame_bytes(FrameType::Add, &[0xaa, 0xbb]);
        assert_eq!(bytes, vec![VERSION, 3, 0, 2, 0xaa, 0xbb]);
    }

    #[test]
    fn test_decode_consumes_header() {
        let bytes = frame_bytes(FrameType::Query, &[1, 2, 3, 4]);
        let mut buf = PktBuf::new(64);
        buf.put_slice(&bytes);
        buf.rewind();

        let hdr = decode(&mut buf).unwrap();
        assert_eq!(hdr.version, VERSION);
        assert_eq!(hdr.frame_type, FrameType::Query as u8);
        assert_eq!(hdr.body_len, 4);
        assert_eq!(buf.current(), &[1, 2, 3, 4]);
        assert_eq!(buf.heading_data(), 0);
    }

    #[test]
    fn test_decode_partial_at_every_boundary() {
        let bytes = frame_bytes(FrameType::Response, b"\x00\x02\x00host");
        for split in 0..bytes.len() {
            let mut buf = PktBuf::new(64);
            buf.put_slice(&bytes[..split]);
            buf.rewind();
            assert!(
                matches!(decode(&mut buf), Err(Error::Again)),
                "prefix of {split} bytes must ask for more"
            );

            // feeding the remainder completes the frame
            buf.forward(buf.trailing_data());
            buf.put_slice(&bytes[split..]);
            buf.rewind();
            let hdr = decode(&mut buf).unwrap();
            assert_eq!(hdr.body_len, 7);
            assert_eq!(buf.current(), b"\x00\x02\x00host");
        }
    }

    #[test]
    fn test_decode_version_mismatch() {
        let mut bytes = frame_bytes(FrameType::Query, &[]);
        bytes[0] = VERSION + 1;
        let mut buf = PktBuf::new(16);
        buf.put_slice(&bytes);
        buf.rewind();
        assert!(matches!(
            decode(&mut buf),
            Err(Error::VersionMismatch { peer, .. }) if peer == VERSION + 1
        ));
    }

    #[test]
    fn test_decode_oversize_body() {
        let mut buf = PktBuf::new(16);
        buf.put_u8(VERSION);
        buf.put_u8(FrameType::Add as u8);
        buf.put_u16(u16::MAX);
        buf.rewind();
        assert!(matches!(decode(&mut buf), Err(Error::TooLarge { .. })));
    }
}
