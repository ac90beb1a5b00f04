//! Local endpoint, access rules and framed reads for the control channel.
//!
//! The helper binds a Unix domain socket at a well-known path, accepts a
//! single peer within a bounded wait, and reads length-prefixed envelopes
//! from it on a dedicated thread.

mod access;
mod connection;
mod errors;
mod framing;
mod listener;
mod reader;

pub use self::access::{AccessPolicy, AccessRights, AccessRule, Principal};
pub use self::connection::Connection;
pub use self::errors::{ConnectionError, ListenerError};
pub(crate) use self::framing::{FrameAssembler, FrameError, encode_frame};
pub(crate) use self::listener::{BindOptions, PipeListener};
pub(crate) use self::reader::{ReadLoop, ReadLoopExit};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
