//! Supervised per-message worker threads.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use fulltrust_envelope::decode_str;

use super::turnstile::Turnstile;
use super::{DISPATCH_TARGET, DispatchError, Dispatcher, describe_panic};
use crate::transport::Connection;

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Spawns one named worker per message and tracks it until teardown.
///
/// Workers overlap, but a [`Turnstile`] makes each one enter the dispatcher
/// and every handler only after the previous message has, so handlers see
/// commands in arrival order.
///
/// Every worker's outcome is logged: success at `debug`, dispatch errors at
/// `warn` (elevation failures at `error`) and panics at `error`.
#[derive(Debug)]
pub(crate) struct DispatchSupervisor {
    dispatcher: Arc<Dispatcher>,
    connection: Arc<Connection>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sequence: AtomicU64,
    turnstile: Arc<Turnstile>,
}

impl DispatchSupervisor {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, connection: Arc<Connection>) -> Self {
        let turnstile = Turnstile::new(dispatcher.stage_count());
        Self {
            dispatcher,
            connection,
            workers: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            turnstile,
        }
    }

    /// Decodes `text` and dispatches it without waiting for completion.
    ///
    /// Malformed messages are logged and dropped.
    pub(crate) fn submit(&self, text: &str) {
        let message = match decode_str(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "malformed message dropped");
                return;
            }
        };
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut ticket = self.turnstile.ticket(sequence);
        let dispatcher = Arc::clone(&self.dispatcher);
        let connection = Arc::clone(&self.connection);
        let spawned = thread::Builder::new()
            .name(format!("dispatch-{sequence}"))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    ticket.enter(0);
                    if !Dispatcher::offers_to_handlers(&message) {
                        // Built-ins may block (an elevation prompt); they
                        // must not hold later messages back from handlers.
                        ticket.release();
                    }
                    dispatcher.dispatch_in_turn(&connection, &message, |index| {
                        ticket.enter(index + 1);
                    })
                }));
                drop(ticket);
                report(sequence, outcome);
            });
        match spawned {
            Ok(handle) => {
                let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
            }
            Err(error) => {
                error!(
                    target: DISPATCH_TARGET,
                    sequence,
                    error = %error,
                    "failed to start dispatch worker; message dropped"
                );
            }
        }
    }

    /// Joins outstanding workers, giving up after `timeout`.
    ///
    /// Returns the number of workers still running when the wait ended.
    pub(crate) fn drain(&self, timeout: Duration) -> usize {
        let pending: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let deadline = Instant::now() + timeout;
        let mut abandoned = 0;
        for worker in pending {
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(DRAIN_POLL);
            }
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!(
                target: DISPATCH_TARGET,
                abandoned,
                "dispatch workers still running at teardown"
            );
        }
        abandoned
    }
}

fn report(sequence: u64, outcome: std::thread::Result<Result<(), DispatchError>>) {
    match outcome {
        Ok(Ok(())) => debug!(target: DISPATCH_TARGET, sequence, "message dispatched"),
        Ok(Err(error @ DispatchError::Elevation(_))) => {
            error!(target: DISPATCH_TARGET, sequence, error = %error, "elevation failed");
        }
        Ok(Err(error)) => {
            warn!(target: DISPATCH_TARGET, sequence, error = %error, "dispatch failed");
        }
        Err(payload) => {
            error!(
                target: DISPATCH_TARGET,
                sequence,
                panic = %describe_panic(payload.as_ref()),
                "dispatch worker panicked"
            );
        }
    }
}
