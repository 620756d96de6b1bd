//! MetricIO Proto - Wire protocol and connection layer
//!
//! This crate provides the byte cursor buffer, the outbound packet queue,
//! the length-prefixed frame codec, the message codecs, and the connection
//! driver shared by the server and the client.

pub mod buf;
pub mod conn;
pub mod frame;
pub mod msg;
pub mod queue;

pub use buf::PktBuf;
pub use conn::{ConnState, Connection, Recv, IO_TIMEOUT};
pub use frame::{FrameType, Header, HEADER_SIZE, MAX_BODY_SIZE, MAX_FRAME_SIZE, VERSION};
pub use msg::{Add, Query, Response, ResponseCode};
pub use queue::PktQueue;
