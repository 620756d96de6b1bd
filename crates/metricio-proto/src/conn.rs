//! Connection driver
//!
//! One `Connection` owns a stream, an inbound byte buffer, and an outbound
//! frame queue, and walks a small lifecycle:
//!
//! ```text
//! Init ──> Pending ──> Established ──> Disconnected
//! ```
//!
//! Every read and write carries a [`IO_TIMEOUT`] deadline; a peer that
//! stalls past it is disconnected. Disconnecting is idempotent and drops
//! any frames still queued.

use crate::buf::PktBuf;
use crate::queue::PktQueue;
use bytes::Buf;
use metricio_common::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Deadline for each individual read or write
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Created, not yet picked up
    Init,
    /// Picked up, no traffic yet
    Pending,
    /// First I/O completed
    Established,
    /// Shut down, terminal
    Disconnected,
}

impl ConnState {
    /// State name for logging
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Pending => "pending",
            Self::Established => "established",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Disposition returned by a [`Connection::run`] callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// Keep the connection open and read more
    More,
    /// Flush queued frames, then close
    Done,
}

/// Stream plus inbound buffer and outbound queue
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    name: String,
    state: ConnState,
    ibuf: PktBuf,
    obuf: PktQueue,
}

impl Connection<TcpStream> {
    /// Wrap an accepted socket, naming the connection after the peer
    #[must_use]
    pub fn accept(stream: TcpStream) -> Self {
        let name = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
        Self::new(stream, name, crate::frame::MAX_FRAME_SIZE)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a connection over `stream` with the given inbound capacity
    pub fn new(stream: S, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            stream,
            name: name.into(),
            state: ConnState::Init,
            ibuf: PktBuf::new(capacity),
            obuf: PktQueue::new(),
        }
    }

    /// Peer name used in logs
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> ConnState {
        self.state
    }

    /// Inbound buffer, for decoding outside [`Connection::run`]
    pub fn inbound(&mut self) -> &mut PktBuf {
        &mut self.ibuf
    }

    fn set_state(&mut self, next: ConnState) {
        if self.state == next {
            return;
        }
        debug!(
            peer = %self.name,
            from = self.state.as_str(),
            to = next.as_str(),
            "state change"
        );
        self.state = next;
    }

    /// Mark the connection picked up by a servicing task
    pub fn read_enable(&mut self) {
        if self.state == ConnState::Init {
            self.set_state(ConnState::Pending);
        }
    }

    /// Mark the first I/O completed
    pub fn establish(&mut self) {
        if matches!(self.state, ConnState::Init | ConnState::Pending) {
            self.set_state(ConnState::Established);
        }
    }

    /// Shut the stream down and drop queued frames. Safe to call twice.
    pub async fn disconnect(&mut self) {
        if self.state == ConnState::Disconnected {
            return;
        }
        let _ = self.stream.shutdown().await;
        self.obuf.purge();
        self.set_state(ConnState::Disconnected);
    }

    /// Queue an encoded frame for transmission
    pub fn queue_write(&mut self, buf: &PktBuf) -> Result<()> {
        if self.state == ConnState::Disconnected {
            error!(peer = %self.name, "write on disconnected connection");
            return Err(Error::Closed);
        }
        self.obuf.enqueue(buf);
        Ok(())
    }

    /// Perform one read into the inbound buffer
    ///
    /// A deadline overrun or a peer close disconnects before returning
    /// the error.
    pub async fn fill(&mut self) -> Result<usize> {
        match timeout(IO_TIMEOUT, self.ibuf.read_from(&mut self.stream)).await {
            Ok(Ok(n)) => {
                self.establish();
                Ok(n)
            }
            Ok(Err(err)) => {
                self.disconnect().await;
                Err(err)
            }
            Err(_) => {
                warn!(peer = %self.name, "read timeout");
                self.disconnect().await;
                Err(Error::Timeout)
            }
        }
    }

    /// Write every queued frame, handling short writes
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            let step = {
                let Some(frame) = self.obuf.fetch_first() else {
                    return Ok(());
                };
                match timeout(IO_TIMEOUT, self.stream.write(frame)).await {
                    Ok(Ok(0)) => Err(Error::Closed),
                    Ok(Ok(n)) => {
                        frame.advance(n);
                        Ok(frame.is_empty())
                    }
                    Ok(Err(err)) => Err(err.into()),
                    Err(_) => {
                        warn!(peer = %self.name, "write timeout");
                        Err(Error::Timeout)
                    }
                }
            };
            match step {
                Ok(true) => {
                    self.establish();
                    self.obuf.drop_first();
                }
                Ok(false) => self.establish(),
                Err(err) => {
                    self.disconnect().await;
                    return Err(err);
                }
            }
        }
    }

    /// Drive the connection to completion.
    ///
    /// The callback consumes frames from the inbound buffer and queues
    /// replies; it returns [`Error::Again`] when the buffered bytes do not
    /// yet hold a whole frame. A clean close by the peer ends the loop
    /// without error; any other failure disconnects and propagates.
    pub async fn run<F>(&mut self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&mut PktBuf, &mut PktQueue) -> Result<Recv>,
    {
        self.read_enable();
        loop {
            loop {
                match on_frame(&mut self.ibuf, &mut self.obuf) {
                    Ok(Recv::More) => {}
                    Ok(Recv::Done) => {
                        let res = self.flush().await;
                        self.disconnect().await;
                        return res;
                    }
                    Err(err) if err.is_again() => break,
                    Err(err) => {
                        // best effort, the peer may still get a reply
                        let _ = self.flush().await;
                        self.disconnect().await;
                        return Err(err);
                    }
                }
            }
            self.flush().await?;
            match self.fill().await {
                Ok(_) => {}
                Err(Error::Closed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }
}
