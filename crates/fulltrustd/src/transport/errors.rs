//! Error types for endpoint and connection operations.

use std::io;
use std::time::Duration;

use thiserror::Error;

use fulltrust_envelope::CodecError;

/// Errors surfaced while binding the endpoint or waiting for the peer.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to inspect existing socket at {path}: {source}")]
    UnixMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("path {path} exists and is not a socket")]
    UnixNotSocket { path: String },
    #[error("another helper is already listening at {path}")]
    EndpointInUse { path: String },
    #[error("failed to probe existing socket at {path}: {source}")]
    UnixConnect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale socket at {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to apply access rules to {path}: {source}")]
    Permissions {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("client group '{group}' could not be resolved")]
    UnknownGroup { group: String },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("no peer connected within {timeout:?}")]
    AcceptTimeout { timeout: Duration },
    #[error("waiting for the peer was cancelled")]
    AcceptCancelled,
    #[error("failed to accept peer connection: {source}")]
    Accept {
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced while writing envelopes to the peer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer has gone away.
    #[error("peer connection is closed")]
    Disconnected,
    /// The envelope could not be serialised.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] CodecError),
    /// The payload does not fit the frame header.
    #[error("envelope of {size} bytes exceeds the frame limit")]
    TooLarge { size: usize },
    /// Writing the frame failed.
    #[error("failed to write envelope: {0}")]
    Io(#[from] io::Error),
}
