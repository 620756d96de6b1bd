//! Message codecs
//!
//! Body layouts for each frame type, encoded after [`frame::begin`] and
//! sealed with [`frame::finish`]. Decoders run with the cursor at the body
//! start, after [`frame::decode`] accepted the header, and consume the
//! whole body on success.
//!
//! ```text
//! Query    | LocType | MaxCount | Kind | Op  | Value | Start | End |
//!          | 1B      | 1B       | 1B   | 1B  | 8B    | 8B    | 8B  |
//!
//! Response | Code | Remaining | Score | Locator |
//!          | 1B   | 1B        | 1B    | var     |
//!
//! Add      | Kind | Time | Value | Locator |
//!          | 1B   | 8B   | 8B    | var     |
//! ```

#![allow(clippy::cast_possible_truncation)]

use crate::buf::PktBuf;
use crate::frame::{self, FrameType, Header, MAX_BODY_SIZE};
use metricio_common::{CompareOp, Error, LocatorType, MetricKind, Predicate, Result};

/// Query body size in bytes, always exact
pub const QUERY_BODY_SIZE: usize = 28;

/// Smallest response body, a terminator without a locator
pub const RESPONSE_MIN_SIZE: usize = 3;

/// Smallest add body, a record without a locator
pub const ADD_MIN_SIZE: usize = 17;

/// Largest locator an add body can carry
pub const MAX_LOCATOR_SIZE: usize = MAX_BODY_SIZE - ADD_MIN_SIZE;

/// Result status carried in the first response byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    /// Match delivered, or clean end of stream
    Ok = 0,
    /// Query finished without any match
    NoResults = 1,
    /// Add rejected, timestamp precedes the last record
    OutOfRange = 2,
    /// Unknown kind, operator, or frame type
    Unsupported = 3,
    /// Frame or locator over the size limit
    TooLarge = 4,
    /// Malformed body
    Invalid = 5,
    /// Server-side storage failure
    Io = 6,
}

impl ResponseCode {
    /// Decode a wire discriminant
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::NoResults),
            2 => Some(Self::OutOfRange),
            3 => Some(Self::Unsupported),
            4 => Some(Self::TooLarge),
            5 => Some(Self::Invalid),
            6 => Some(Self::Io),
            _ => None,
        }
    }

    /// Map a local error to the code reported to the peer
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::NoResults => Self::NoResults,
            Error::OutOfRange => Self::OutOfRange,
            Error::Unsupported(_) | Error::VersionMismatch { .. } => Self::Unsupported,
            Error::TooLarge { .. } => Self::TooLarge,
            Error::Invalid(_) => Self::Invalid,
            _ => Self::Io,
        }
    }

    /// Map a received non-zero code back to an error
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self::Ok => Error::invalid("response code 0 is not an error"),
            Self::NoResults => Error::NoResults,
            Self::OutOfRange => Error::OutOfRange,
            code => Error::Remote(code as u8),
        }
    }
}

/// Value/time predicate query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub loc_type: LocatorType,
    pub max_count: u8,
    pub predicate: Predicate,
}

impl Query {
    /// Encode a complete query frame into `buf`
    pub fn encode(&self, buf: &mut PktBuf) {
        frame::begin(buf);
        buf.put_u8(self.loc_type as u8);
        buf.put_u8(self.max_count);
        buf.put_u8(self.predicate.kind as u8);
        buf.put_u8(self.predicate.op as u8);
        buf.put_u64(self.predicate.value);
        buf.put_u64(self.predicate.start);
        buf.put_u64(self.predicate.end);
        frame::finish(buf, FrameType::Query);
    }

    /// Decode a query body.
    ///
    /// Consumes the whole body even when rejecting it, so the next frame
    /// parses cleanly.
    pub fn decode(buf: &mut PktBuf, header: &Header) -> Result<Self> {
        if header.body_len != QUERY_BODY_SIZE {
            buf.forward(header.body_len.min(buf.trailing_data()));
            buf.trim_head(buf.heading_data());
            return Err(Error::invalid(format!(
                "query body must be {QUERY_BODY_SIZE} bytes, got {}",
                header.body_len
            )));
        }
        let loc_type = buf.get_u8();
        let max_count = buf.get_u8();
        let kind = buf.get_u8();
        let op = buf.get_u8();
        let value = buf.get_u64();
        let start = buf.get_u64();
        let end = buf.get_u64();
        buf.trim_head(buf.heading_data());

        let loc_type = LocatorType::from_u8(loc_type)
            .ok_or_else(|| Error::unsupported(format!("locator type {loc_type}")))?;
        let kind = MetricKind::from_u8(kind)
            .ok_or_else(|| Error::unsupported(format!("metric kind {kind}")))?;
        let op = CompareOp::from_u8(op)
            .ok_or_else(|| Error::unsupported(format!("compare operator {op}")))?;
        Ok(Self {
            loc_type,
            max_count,
            predicate: Predicate {
                kind,
                op,
                value,
                start,
                end,
            },
        })
    }
}

/// One query result, or the stream terminator
///
/// A terminator carries `remaining == 0` and an empty locator. A match
/// frame may also carry `remaining == 0` when it is the last one the
/// server will deliver, so only the empty locator ends the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u8,
    pub remaining: u8,
    pub score: u8,
    pub locator: Vec<u8>,
}

impl Response {
    /// Build a match frame
    #[must_use]
    pub fn record(remaining: u8, score: u8, locator: Vec<u8>) -> Self {
        Self {
            code: ResponseCode::Ok as u8,
            remaining,
            score,
            locator,
        }
    }

    /// Build the stream terminator for `code`
    #[must_use]
    pub fn terminator(code: ResponseCode) -> Self {
        Self {
            code: code as u8,
            remaining: 0,
            score: 0,
            locator: Vec::new(),
        }
    }

    /// Whether this frame ends the response stream
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.code != ResponseCode::Ok as u8 || (self.remaining == 0 && self.locator.is_empty())
    }

    /// Encode a complete response frame into `buf`
    pub fn encode(&self, buf: &mut PktBuf) {
        frame::begin(buf);
        buf.put_u8(self.code);
        buf.put_u8(self.remaining);
        buf.put_u8(self.score);
        buf.put_slice(&self.locator);
        frame::finish(buf, FrameType::Response);
    }

    /// Decode a response body. Consumes the whole body even when
    /// rejecting it.
    pub fn decode(buf: &mut PktBuf, header: &Header) -> Result<Self> {
        if header.body_len < RESPONSE_MIN_SIZE {
            buf.forward(header.body_len.min(buf.trailing_data()));
            buf.trim_head(buf.heading_data());
            return Err(Error::invalid(format!(
                "response body must be at least {RESPONSE_MIN_SIZE} bytes, got {}",
                header.body_len
            )));
        }
        let code = buf.get_u8();
        let remaining = buf.get_u8();
        let score = buf.get_u8();
        let loc_len = header.body_len - RESPONSE_MIN_SIZE;
        let locator = buf.current()[..loc_len].to_vec();
        buf.forward(loc_len);
        buf.trim_head(buf.heading_data());
        Ok(Self {
            code,
            remaining,
            score,
            locator,
        })
    }
}

/// Append one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Add {
    pub kind: MetricKind,
    pub time: u64,
    pub value: u64,
    pub locator: Vec<u8>,
}

impl Add {
    /// Encode a complete add frame into `buf`
    pub fn encode(&self, buf: &mut PktBuf) {
        frame::begin(buf);
        buf.put_u8(self.kind as u8);
        buf.put_u64(self.time);
        buf.put_u64(self.value);
        buf.put_slice(&self.locator);
        frame::finish(buf, FrameType::Add);
    }

    /// Decode an add body. Consumes the whole body even when rejecting
    /// it.
    pub fn decode(buf: &mut PktBuf, header: &Header) -> Result<Self> {
        if header.body_len < ADD_MIN_SIZE {
            buf.forward(header.body_len.min(buf.trailing_data()));
            buf.trim_head(buf.heading_data());
            return Err(Error::invalid(format!(
                "add body must be at least {ADD_MIN_SIZE} bytes, got {}",
                header.body_len
            )));
        }
        let kind = buf.get_u8();
        let time = buf.get_u64();
        let value = buf.get_u64();
        let loc_len = header.body_len - ADD_MIN_SIZE;
        let locator = buf.current()[..loc_len].to_vec();
        buf.forward(loc_len);
        buf.trim_head(buf.heading_data());

        let kind = MetricKind::from_u8(kind)
            .ok_or_else(|| Error::unsupported(format!("metric kind {kind}")))?;
        Ok(Self {
            kind,
            time,
            value,
            locator,
        })
    }
}
