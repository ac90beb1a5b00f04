use std::io;

use thiserror::Error;

use crate::transport::ConnectionError;

/// Failures while starting the elevated successor.
#[derive(Debug, Error)]
pub enum RelaunchError {
    /// The broker refused to run because permission was not granted.
    #[error("elevation through '{program}' was declined")]
    Declined { program: String },

    /// The helper could not locate its own executable.
    #[error("failed to resolve the helper executable: {source}")]
    CurrentExe {
        #[source]
        source: io::Error,
    },

    /// The broker could not be started.
    #[error("failed to start privilege broker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The socket the successor reports to could not be opened.
    #[error("failed to open handover socket '{path}': {source}")]
    Handover {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failures surfaced by the elevation handshake.
#[derive(Debug, Error)]
pub enum ElevationError {
    /// Relaunching failed for a reason other than a declined prompt.
    #[error("elevated relaunch failed: {0}")]
    Relaunch(#[source] RelaunchError),

    /// The outcome could not be reported to the peer.
    #[error("failed to report elevation outcome: {0}")]
    Reply(#[from] ConnectionError),
}
