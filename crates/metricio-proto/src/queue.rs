//! Outbound packet queue
//!
//! FIFO of owned frame snapshots awaiting transmission. Enqueueing deep
//! copies the source buffer's live data, so the caller may reset and reuse
//! its encode buffer immediately.

use crate::buf::PktBuf;
use bytes::Bytes;
use std::collections::VecDeque;

/// FIFO queue of encoded frames
#[derive(Debug, Default)]
pub struct PktQueue {
    frames: VecDeque<Bytes>,
}

impl PktQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the buffer's live data onto the queue tail
    pub fn enqueue(&mut self, buf: &PktBuf) {
        self.frames.push_back(Bytes::copy_from_slice(buf.as_slice()));
    }

    /// Peek the frame at the queue head
    pub fn fetch_first(&mut self) -> Option<&mut Bytes> {
        self.frames.front_mut()
    }

    /// Release the frame at the queue head after it was fully written
    pub fn drop_first(&mut self) {
        self.frames.pop_front();
    }

    /// Drop all queued frames
    pub fn purge(&mut self) {
        self.frames.clear();
    }

    /// Whether no frames are queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of queued frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_snapshots() {
        let mut buf = PktBuf::new(16);
        buf.put_slice(b"first");

        let mut q = PktQueue::new();
        q.enqueue(&buf);

        // the queued copy is independent of the source buffer
        buf.reset(0);
        buf.put_slice(b"second");
        q.enqueue(&buf);

        assert_eq!(q.len(), 2);
        assert_eq!(q.fetch_first().unwrap().as_ref(), b"first");
        q.drop_first();
        assert_eq!(q.fetch_first().unwrap().as_ref(), b"second");
        q.drop_first();
        assert!(q.is_empty());
    }

    #[test]
    fn test_purge() {
        let mut buf = PktBuf::new(8);
        buf.put_u32(1);
        let mut q = PktQueue::new();
        q.enqueue(&buf);
        q.enqueue(&buf);
        q.purge();
        assert!(q.is_empty());
    }
}
