//! Write-to-slave queue.
//!
//! Handlers append replies (device attributes, reports, DCS answers) in the
//! order they are generated; the event loop drains the queue into the PTY.
//! A short or would-block write leaves the remainder queued.

use std::collections::VecDeque;
use std::io::{self, Write};

/// Outcome of a drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Everything was written.
    Done,
    /// The writer accepted only part; call again when it is writable.
    Pending,
}

/// FIFO of bytes destined for the child.
#[derive(Debug, Default, Clone)]
pub struct ReplyQueue {
    buf: VecDeque<u8>,
}

impl ReplyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    pub fn push_str(&mut self, s: &str) {
        self.push(s.as_bytes());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take every queued byte.
    pub fn take(&mut self) -> Vec<u8> {
        self.buf.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write as much as `w` accepts.
    ///
    /// `Interrupted` is retried. `WouldBlock` and zero-length writes stop the
    /// drain with [`Drain::Pending`]. Other errors propagate and keep the
    /// unwritten bytes queued.
    pub fn write_to<W: Write + ?Sized>(&mut self, w: &mut W) -> io::Result<Drain> {
        while !self.buf.is_empty() {
            let (front, _) = self.buf.as_slices();
            match w.write(front) {
                Ok(0) => return Ok(Drain::Pending),
                Ok(n) => {
                    self.buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Drain::Pending),
                Err(e) => return Err(e),
            }
        }
        w.flush()?;
        Ok(Drain::Done)
    }
}
