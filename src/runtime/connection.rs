//! Connection state machine.
//!
//! Each connection moves through reading and writing phases and derives its
//! readiness interest from the current state. `Closing` is terminal: the
//! reactor reaps the connection at the end of the tick that marked it.

use crate::protocol::frame::{self, Decode, FrameError, HEADER_LEN};
use crate::protocol::handler;
use crate::runtime::buffer::{ConnBuffer, Drain};
use crate::storage::Store;
use mio::net::TcpStream;
use mio::Interest;
use std::io::{self, Read};
use tracing::{debug, warn};

/// Bytes pulled off the socket per read call.
const READ_CHUNK: usize = 16 * 1024;

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for request bytes.
    Reading,
    /// Draining queued response bytes.
    Writing,
    /// Connection is finished; the reactor releases it.
    Closing,
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    state: ConnState,
    buffers: ConnBuffer,
    max_frame: usize,
    /// Interest currently registered with the poller.
    registered: Interest,
}

impl Connection {
    /// Create a new connection in initial reading state.
    ///
    /// The buffer cap admits one maximum-size frame plus a read burst, so
    /// well-behaved pipelining never trips it.
    pub fn new(stream: TcpStream, max_frame: usize) -> Self {
        Self {
            stream,
            state: ConnState::Reading,
            buffers: ConnBuffer::new(max_frame + HEADER_LEN + READ_CHUNK),
            max_frame,
            registered: Interest::READABLE,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_closing(&self) -> bool {
        self.state == ConnState::Closing
    }

    /// The readiness interest this connection wants, or `None` when it is
    /// ready to be reaped.
    pub fn interest(&self) -> Option<Interest> {
        match self.state {
            ConnState::Reading => Some(Interest::READABLE),
            ConnState::Writing => Some(Interest::WRITABLE),
            ConnState::Closing => None,
        }
    }

    pub fn registered(&self) -> Interest {
        self.registered
    }

    pub fn set_registered(&mut self, interest: Interest) {
        self.registered = interest;
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Readable event: pull bytes off the socket until it would block,
    /// servicing complete frames as they arrive. EOF, read errors, and
    /// protocol violations mark the connection closing; queued responses
    /// flip it to writing.
    pub fn on_readable(&mut self, store: &mut Store) {
        if self.state != ConnState::Reading {
            return;
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!("peer closed connection");
                    self.state = ConnState::Closing;
                    return;
                }
                Ok(n) => {
                    if let Err(e) = self.buffers.append_read(&chunk[..n]) {
                        warn!(error = %e, "read buffer overrun");
                        self.state = ConnState::Closing;
                        return;
                    }
                    if let Err(e) = service_frames(&mut self.buffers, store, self.max_frame) {
                        warn!(error = %e, "protocol violation");
                        self.state = ConnState::Closing;
                        return;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(error = %e, "read failed");
                    self.state = ConnState::Closing;
                    return;
                }
            }
        }

        if self.buffers.has_pending_write() {
            self.state = ConnState::Writing;
        }
    }

    /// Writable event: drain queued responses until the socket would block.
    /// A fully drained buffer flips back to reading; write errors mark the
    /// connection closing.
    pub fn on_writable(&mut self) {
        if self.state != ConnState::Writing {
            return;
        }

        loop {
            match self.buffers.drain_write(&mut self.stream) {
                Ok(Drain::Drained) => {
                    self.state = ConnState::Reading;
                    return;
                }
                Ok(Drain::Partial) => continue,
                Ok(Drain::WouldBlock) => return,
                Err(e) => {
                    debug!(error = %e, "write failed");
                    self.state = ConnState::Closing;
                    return;
                }
            }
        }
    }
}

/// Decode and execute every complete frame currently buffered, queueing the
/// responses in arrival order (pipelining). Incomplete trailing bytes are
/// left for the next read event.
fn service_frames(
    buffers: &mut ConnBuffer,
    store: &mut Store,
    max_frame: usize,
) -> Result<(), FrameError> {
    loop {
        let (args, frame_len) = match frame::decode(buffers.read_slice(), max_frame) {
            Decode::Complete { payload, frame_len } => (frame::parse_request(payload)?, frame_len),
            Decode::Incomplete => return Ok(()),
            Decode::Error(e) => return Err(e),
        };

        let reply = handler::execute(store, &args);
        buffers.append_write(&frame::encode_response(reply.status, &reply.body));
        buffers.consume_read(frame_len);
    }
}
