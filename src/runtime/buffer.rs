//! Per-connection read/write accumulators.
//!
//! The read buffer grows by appending newly read bytes at the tail and
//! shrinks by consuming a prefix; consumption advances a cursor rather than
//! shifting bytes. The write buffer queues encoded responses and drains
//! through non-blocking writes, preserving the unwritten remainder across
//! partial writes.

use crate::protocol::frame::FrameError;
use bytes::{Buf, BytesMut};
use std::io::{self, Write};

/// Outcome of one write attempt against the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The write buffer is empty.
    Drained,
    /// Some bytes were written; more remain queued.
    Partial,
    /// The socket cannot accept bytes right now. State is untouched.
    WouldBlock,
}

/// Read and write accumulators for one connection.
#[derive(Debug)]
pub struct ConnBuffer {
    rbuf: BytesMut,
    wbuf: BytesMut,
    /// Cap on buffered read bytes; exceeding it is connection-fatal.
    cap: usize,
}

impl ConnBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            rbuf: BytesMut::new(),
            wbuf: BytesMut::new(),
            cap,
        }
    }

    /// Append newly read bytes at the tail of the read buffer.
    pub fn append_read(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        if self.rbuf.len() + bytes.len() > self.cap {
            return Err(FrameError::BufferLimit { max: self.cap });
        }
        self.rbuf.extend_from_slice(bytes);
        Ok(())
    }

    /// The unconsumed read bytes.
    pub fn read_slice(&self) -> &[u8] {
        &self.rbuf
    }

    /// Remove `n` bytes from the head of the read buffer.
    pub fn consume_read(&mut self, n: usize) {
        self.rbuf.advance(n);
    }

    /// Queue encoded response bytes.
    pub fn append_write(&mut self, bytes: &[u8]) {
        self.wbuf.extend_from_slice(bytes);
    }

    /// The queued, not yet written bytes.
    pub fn write_slice(&self) -> &[u8] {
        &self.wbuf
    }

    pub fn has_pending_write(&self) -> bool {
        !self.wbuf.is_empty()
    }

    /// Perform exactly one write attempt against `sink`.
    ///
    /// On a partial write, exactly the written prefix is removed and the
    /// remainder retained. A sink reporting zero bytes written is a fatal
    /// error; so is any error other than would-block.
    pub fn drain_write<W: Write>(&mut self, sink: &mut W) -> io::Result<Drain> {
        if self.wbuf.is_empty() {
            return Ok(Drain::Drained);
        }

        match sink.write(&self.wbuf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write returned 0",
            )),
            Ok(n) => {
                self.wbuf.advance(n);
                if self.wbuf.is_empty() {
                    Ok(Drain::Drained)
                } else {
                    Ok(Drain::Partial)
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Drain::WouldBlock),
            Err(e) => Err(e),
        }
    }
}
