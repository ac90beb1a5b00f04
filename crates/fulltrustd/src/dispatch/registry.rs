//! Ordered collection of message handlers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, warn};

use fulltrust_envelope::Envelope;

use super::{DISPATCH_TARGET, HandlerError, HandlerInitError, describe_panic};
use crate::transport::Connection;

/// A pluggable consumer of non-built-in commands.
///
/// Every handler sees every such envelope and decides for itself whether the
/// command concerns it. Handlers are shared across dispatch workers, so
/// `handle` may run concurrently for pipelined messages.
pub trait MessageHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Prepares the handler once the peer connection exists.
    fn initialize(&self, _connection: &Arc<Connection>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Processes one envelope whose command name is `command`.
    fn handle(
        &self,
        connection: &Connection,
        message: &Envelope,
        command: &str,
    ) -> Result<(), HandlerError>;

    /// Releases handler resources during shutdown.
    fn dispose(&self) {}
}

/// Handlers in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn MessageHandler>>,
    disposed: AtomicBool,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler; it is offered messages after those already present.
    pub fn register(&mut self, handler: Box<dyn MessageHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Initialises every handler in order, stopping at the first failure.
    pub fn initialize_all(&self, connection: &Arc<Connection>) -> Result<(), HandlerInitError> {
        for handler in &self.handlers {
            handler
                .initialize(connection)
                .map_err(|source| HandlerInitError {
                    handler: handler.name().to_owned(),
                    source,
                })?;
            debug!(target: DISPATCH_TARGET, handler = handler.name(), "handler initialised");
        }
        Ok(())
    }

    /// Offers `message` to every handler in registration order.
    ///
    /// A failing or panicking handler is logged and does not prevent the
    /// remaining handlers from seeing the message.
    pub fn offer(&self, connection: &Connection, message: &Envelope, command: &str) {
        self.offer_in_turn(connection, message, command, |_| {});
    }

    /// Offers `message` like [`offer`](Self::offer), calling `before_handler`
    /// with each handler's index just before that handler runs.
    pub(crate) fn offer_in_turn(
        &self,
        connection: &Connection,
        message: &Envelope,
        command: &str,
        mut before_handler: impl FnMut(usize),
    ) {
        for (index, handler) in self.handlers.iter().enumerate() {
            before_handler(index);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                handler.handle(connection, message, command)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        handler = handler.name(),
                        command,
                        error = %error,
                        "handler failed"
                    );
                }
                Err(payload) => {
                    error!(
                        target: DISPATCH_TARGET,
                        handler = handler.name(),
                        command,
                        panic = %describe_panic(payload.as_ref()),
                        "handler panicked"
                    );
                }
            }
        }
    }

    /// Disposes every handler in reverse registration order.
    ///
    /// Only the first call has any effect.
    pub fn dispose_all(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for handler in self.handlers.iter().rev() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler.dispose())) {
                error!(
                    target: DISPATCH_TARGET,
                    handler = handler.name(),
                    panic = %describe_panic(payload.as_ref()),
                    "handler panicked during disposal"
                );
            }
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|handler| handler.name()).collect();
        formatter
            .debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}
