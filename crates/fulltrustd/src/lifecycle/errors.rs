//! Unified error surface for launching and supervising the helper.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use fulltrust_config::EndpointPreparationError;

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::one_shot::OneShotError;
use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the helper process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Bootstrapping configuration and telemetry failed.
    #[error("helper bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Preparing the endpoint directory failed.
    #[error("failed to prepare endpoint: {source}")]
    Endpoint {
        /// Underlying filesystem error.
        #[source]
        source: EndpointPreparationError,
    },
    /// The one-shot launch request could not be processed.
    #[error("one-shot launch failed: {source}")]
    OneShot {
        /// Underlying launch error.
        #[source]
        source: OneShotError,
    },
    /// Binding the endpoint failed.
    #[error("endpoint listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Installing the termination signal watcher failed.
    #[error("failed to watch shutdown signals: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        match source {
            BootstrapError::Configuration { source } => Self::Config { source },
            other => Self::Bootstrap { source: other },
        }
    }
}

impl From<EndpointPreparationError> for LaunchError {
    fn from(source: EndpointPreparationError) -> Self {
        Self::Endpoint { source }
    }
}

impl From<OneShotError> for LaunchError {
    fn from(source: OneShotError) -> Self {
        Self::OneShot { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
