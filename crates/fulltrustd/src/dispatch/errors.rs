//! Error types for dispatch and handler failures.

use std::io;

use thiserror::Error;

use crate::elevation::ElevationError;
use crate::transport::ConnectionError;

/// Errors surfaced while dispatching one envelope.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `Arguments` was present but not a string.
    #[error("command must be a string, found {found}")]
    InvalidCommand { found: &'static str },

    /// The elevation handshake failed.
    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

/// Errors reported by a handler for one message.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A required field was absent or had the wrong type.
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// Replying to the peer failed.
    #[error("failed to reply: {0}")]
    Reply(#[from] ConnectionError),

    /// An operating system call failed.
    #[error("{action} failed: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    /// Any other handler-specific failure.
    #[error("{message}")]
    Failed { message: String },
}

impl HandlerError {
    /// Builds an [`HandlerError::InvalidField`] error.
    pub const fn invalid_field(field: &'static str, expected: &'static str) -> Self {
        Self::InvalidField { field, expected }
    }

    /// Builds an [`HandlerError::Io`] error.
    pub fn io(action: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            action: action.into(),
            source,
        }
    }

    /// Builds an [`HandlerError::Failed`] error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A handler refused to initialise.
#[derive(Debug, Error)]
#[error("handler '{handler}' failed to initialise: {source}")]
pub struct HandlerInitError {
    pub handler: String,
    #[source]
    pub source: HandlerError,
}
