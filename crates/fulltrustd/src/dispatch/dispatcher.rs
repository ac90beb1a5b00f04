use std::sync::Arc;

use tracing::{debug, info};

use fulltrust_envelope::Envelope;

use super::{Command, DISPATCH_TARGET, DispatchError, HandlerRegistry};
use crate::elevation::ElevationController;
use crate::lifecycle::{ShutdownLatch, ShutdownReason};
use crate::transport::Connection;

/// Routes decoded envelopes to built-in commands or registered handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    elevation: ElevationController,
    shutdown: ShutdownLatch,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared handler registry.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        elevation: ElevationController,
        shutdown: ShutdownLatch,
    ) -> Self {
        Self {
            registry,
            elevation,
            shutdown,
        }
    }

    /// Dispatches one envelope.
    ///
    /// Envelopes without an `Arguments` key are ignored. `Terminate` fires
    /// shutdown without replying, `Elevate` runs the elevation handshake, and
    /// every other command is offered to each handler in registration order.
    pub fn dispatch(
        &self,
        connection: &Connection,
        message: &Envelope,
    ) -> Result<(), DispatchError> {
        self.dispatch_in_turn(connection, message, |_| {})
    }

    /// Number of ordered stages a message passes through: entry plus one
    /// per registered handler.
    pub(crate) fn stage_count(&self) -> usize {
        1 + self.registry.len()
    }

    /// Returns `true` when `message` carries a command for the handlers
    /// rather than a built-in one.
    pub(crate) fn offers_to_handlers(message: &Envelope) -> bool {
        message
            .command()
            .and_then(|value| value.as_str())
            .is_some_and(|name| matches!(Command::parse(name), Command::Handler(_)))
    }

    /// Dispatches like [`dispatch`](Self::dispatch), calling `before_handler`
    /// with each handler's index just before that handler runs.
    pub(crate) fn dispatch_in_turn(
        &self,
        connection: &Connection,
        message: &Envelope,
        before_handler: impl FnMut(usize),
    ) -> Result<(), DispatchError> {
        let Some(value) = message.command() else {
            debug!(target: DISPATCH_TARGET, "message without command ignored");
            return Ok(());
        };
        let name = value.as_str().ok_or(DispatchError::InvalidCommand {
            found: value.kind(),
        })?;
        info!(target: DISPATCH_TARGET, command = name, "dispatching command");

        match Command::parse(name) {
            Command::Terminate => {
                self.shutdown.fire(ShutdownReason::TerminateRequested);
            }
            Command::Elevate => {
                self.elevation.handle(connection, message)?;
            }
            Command::Handler(command) => {
                self.registry
                    .offer_in_turn(connection, message, command, before_handler);
            }
        }
        Ok(())
    }
}
