use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use super::LIFECYCLE_TARGET;

/// Why the helper is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The peer sent `Terminate`.
    TerminateRequested,
    /// An elevated instance was launched to take over.
    Elevated,
    /// The peer closed the connection.
    PeerDisconnected,
    /// Reading from the peer failed.
    ReadFailed(String),
    /// No peer connected, or accepting it failed.
    AcceptFailed(String),
    /// A handler could not be initialised.
    HandlerInitFailed(String),
    /// The process received a termination signal.
    Signal(i32),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TerminateRequested => formatter.write_str("terminate requested"),
            Self::Elevated => formatter.write_str("elevated instance launched"),
            Self::PeerDisconnected => formatter.write_str("peer disconnected"),
            Self::ReadFailed(message) => write!(formatter, "read failed: {message}"),
            Self::AcceptFailed(message) => write!(formatter, "accept failed: {message}"),
            Self::HandlerInitFailed(message) => {
                write!(formatter, "handler initialisation failed: {message}")
            }
            Self::Signal(signal) => write!(formatter, "signal {signal}"),
        }
    }
}

/// Single-fire shutdown latch shared by every component.
///
/// The first [`fire`](Self::fire) wins and records its reason; later calls
/// are ignored.
#[derive(Debug, Clone, Default)]
pub struct ShutdownLatch {
    inner: Arc<LatchState>,
}

#[derive(Debug, Default)]
struct LatchState {
    reason: Mutex<Option<ShutdownReason>>,
    fired: Condvar,
}

impl ShutdownLatch {
    /// Creates an unset latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latch. Returns `true` when this call was the first.
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        info!(
            target: LIFECYCLE_TARGET,
            reason = %reason,
            "shutdown requested"
        );
        *slot = Some(reason);
        self.inner.fired.notify_all();
        true
    }

    /// Returns `true` once the latch has fired.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.reason().is_some()
    }

    /// Reason recorded by the first [`fire`](Self::fire), if any.
    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Blocks until the latch fires.
    pub fn wait(&self) -> ShutdownReason {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(reason) = slot.as_ref() {
                return reason.clone();
            }
            slot = self
                .inner
                .fired
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the latch fires or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownReason> {
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(reason) = slot.as_ref() {
                return Some(reason.clone());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (next, _) = self
                .inner
                .fired
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = next;
        }
    }
}

/// Source of OS-level termination requests.
pub trait ShutdownSignal: Send + Sync {
    /// Starts forwarding termination requests into `latch`.
    fn watch(&self, latch: &ShutdownLatch) -> Result<SignalWatch, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Listener that forwards SIGTERM, SIGINT, SIGQUIT and SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn watch(&self, latch: &ShutdownLatch) -> Result<SignalWatch, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let latch = latch.clone();
        let thread = thread::Builder::new()
            .name("signal-watch".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(
                        target: LIFECYCLE_TARGET,
                        signal,
                        "termination signal received"
                    );
                    latch.fire(ShutdownReason::Signal(signal));
                }
            })
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(SignalWatch {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

/// Running signal watcher; stopped during teardown.
#[derive(Default)]
pub struct SignalWatch {
    handle: Option<Handle>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SignalWatch {
    /// A watcher that observes nothing.
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    /// Stops forwarding signals and joins the watcher thread.
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: LIFECYCLE_TARGET, "signal watcher panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let latch = ShutdownLatch::new();
        assert!(latch.fire(ShutdownReason::TerminateRequested));
        assert!(!latch.fire(ShutdownReason::PeerDisconnected));
        assert_eq!(latch.wait(), ShutdownReason::TerminateRequested);
    }

    #[test]
    fn wait_wakes_when_another_thread_fires() {
        let latch = ShutdownLatch::new();
        let firing = latch.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            firing.fire(ShutdownReason::Signal(SIGTERM));
        });
        assert_eq!(
            latch.wait_timeout(Duration::from_secs(5)),
            Some(ShutdownReason::Signal(SIGTERM))
        );
        worker.join().expect("firing thread");
    }

    #[test]
    fn wait_timeout_expires_when_unset() {
        let latch = ShutdownLatch::new();
        assert_eq!(latch.wait_timeout(Duration::from_millis(10)), None);
        assert!(!latch.is_set());
    }
}
