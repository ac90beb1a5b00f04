//! Command routing for decoded envelopes.
//!
//! Every envelope is dispatched on its own supervised worker thread, gated
//! so that handlers still observe messages in arrival order. The
//! dispatcher reads the command name, runs the built-in lifecycle commands
//! itself, and offers everything else to the registered handlers in order.

mod command;
mod dispatcher;
mod errors;
mod registry;
mod supervisor;
mod turnstile;

use std::any::Any;

pub use self::command::Command;
pub use self::dispatcher::Dispatcher;
pub use self::errors::{DispatchError, HandlerError, HandlerInitError};
pub use self::registry::{HandlerRegistry, MessageHandler};
pub(crate) use self::supervisor::DispatchSupervisor;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Renders a panic payload for logging.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
