//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use fulltrust_config::{Config, PipeEndpoint};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::lifecycle::{LifecycleState, ShutdownReason};
use crate::transport::ListenerError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    State(LifecycleState),
    EndpointBound { elevated: bool },
    PeerConnected,
    AcceptFailed(String),
    ShutdownRequested(ShutdownReason),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Lifecycle states in the order they were entered.
    #[must_use]
    pub fn states(&self) -> Vec<LifecycleState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn state_changed(&self, state: LifecycleState) {
        self.record(HealthEvent::State(state));
    }

    fn endpoint_bound(&self, _endpoint: &PipeEndpoint, elevated: bool) {
        self.record(HealthEvent::EndpointBound { elevated });
    }

    fn peer_connected(&self) {
        self.record(HealthEvent::PeerConnected);
    }

    fn accept_failed(&self, error: &ListenerError) {
        self.record(HealthEvent::AcceptFailed(error.to_string()));
    }

    fn shutdown_requested(&self, reason: &ShutdownReason) {
        self.record(HealthEvent::ShutdownRequested(reason.clone()));
    }
}
