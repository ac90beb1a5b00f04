//! Wire envelope model and JSON codec for the full-trust control channel.
//!
//! Every message exchanged between the sandboxed file manager UI and its
//! full-trust helper is a JSON object whose values are dynamically typed.
//! This crate owns that model and its conversion to and from bytes.
//!
//! # Core types
//!
//! - [`Value`]: the recursive tagged union carried by envelopes
//! - [`Envelope`]: a top-level object with command and correlation helpers
//! - [`Timestamp`]: date/time literals recognised inside string tokens
//! - [`decode`] and [`encode`]: the byte-level codec
//! - [`CodecError`]: failures surfaced while decoding or encoding
//!
//! # Example
//!
//! ```
//! use fulltrust_envelope::{Envelope, Value, decode, encode};
//!
//! let request = Envelope::with_command("LaunchApp").with("Application", "gedit");
//! let bytes = encode(&request).expect("encodes");
//! let decoded = decode(&bytes).expect("decodes");
//! assert_eq!(decoded.get("Application"), Some(&Value::from("gedit")));
//! ```

mod codec;
mod envelope;
mod timestamp;
mod value;

pub use codec::{CodecError, decode, decode_str, encode};
pub use envelope::{COMMAND_KEY, Envelope, REQUEST_ID_KEY, SUCCESS_KEY};
pub use timestamp::Timestamp;
pub use value::{Map, Value};

#[cfg(test)]
mod tests;
