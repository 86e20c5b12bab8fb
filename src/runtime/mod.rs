//! Single-threaded, non-blocking runtime.
//!
//! Shared pieces:
//! - `ConnBuffer`: per-connection read/write accumulators
//! - `Connection`: connection state machine
//! - `Reactor`: the readiness-multiplexed event loop

mod buffer;
mod connection;
mod event_loop;

pub use buffer::{ConnBuffer, Drain};
pub use connection::{ConnState, Connection};
pub use event_loop::Reactor;

use crate::config::Config;
use std::io;

/// Bind and run the server; returns only on fatal listener failure.
pub fn run(config: &Config) -> io::Result<()> {
    let mut reactor = Reactor::bind(config)?;
    reactor.run()
}
