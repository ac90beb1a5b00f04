//! Structured health reporting for helper lifecycle events.

use std::sync::Arc;

use fulltrust_config::{Config, PipeEndpoint};

use crate::bootstrap::BootstrapError;
use crate::lifecycle::{LifecycleState, ShutdownReason};
use crate::transport::ListenerError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked on every lifecycle transition.
    fn state_changed(&self, state: LifecycleState);

    /// Invoked once the endpoint is bound with its access policy.
    fn endpoint_bound(&self, endpoint: &PipeEndpoint, elevated: bool);

    /// Invoked when the peer connects.
    fn peer_connected(&self);

    /// Invoked when no peer could be accepted.
    fn accept_failed(&self, error: &ListenerError);

    /// Invoked when the shutdown latch has fired.
    fn shutdown_requested(&self, reason: &ShutdownReason);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn state_changed(&self, state: LifecycleState) {
        (**self).state_changed(state);
    }

    fn endpoint_bound(&self, endpoint: &PipeEndpoint, elevated: bool) {
        (**self).endpoint_bound(endpoint, elevated);
    }

    fn peer_connected(&self) {
        (**self).peer_connected();
    }

    fn accept_failed(&self, error: &ListenerError) {
        (**self).accept_failed(error);
    }

    fn shutdown_requested(&self, reason: &ShutdownReason) {
        (**self).shutdown_requested(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "bootstrap_starting",
            "starting helper bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "bootstrap_succeeded",
            endpoint = %config.pipe_endpoint(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "helper bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "fulltrustd::health",
            event = "bootstrap_failed",
            error = %error,
            "helper bootstrap failed"
        );
    }

    fn state_changed(&self, state: LifecycleState) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "state_changed",
            state = %state,
            "helper state changed"
        );
    }

    fn endpoint_bound(&self, endpoint: &PipeEndpoint, elevated: bool) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "endpoint_bound",
            endpoint = %endpoint,
            elevated,
            "endpoint ready for the peer"
        );
    }

    fn peer_connected(&self) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "peer_connected",
            "peer connected"
        );
    }

    fn accept_failed(&self, error: &ListenerError) {
        tracing::error!(
            target: "fulltrustd::health",
            event = "accept_failed",
            error = %error,
            "no peer connected"
        );
    }

    fn shutdown_requested(&self, reason: &ShutdownReason) {
        tracing::info!(
            target: "fulltrustd::health",
            event = "shutdown_requested",
            reason = %reason,
            "helper shutting down"
        );
    }
}
