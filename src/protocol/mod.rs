//! Wire protocol: length-prefixed framing and command execution.

pub mod frame;
pub mod handler;

pub use frame::{Decode, FrameError, Status};
pub use handler::{execute, Reply};
