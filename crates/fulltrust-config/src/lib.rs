//! Layered configuration for the full-trust helper.
//!
//! Values resolve from built-in defaults, an optional TOML file
//! (`--config-path`), `FULLTRUST_*` environment variables and command-line
//! flags, in increasing order of precedence.

mod defaults;
mod endpoint;
mod logging;
mod runtime;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACCEPT_TIMEOUT_SECS, DEFAULT_BUFFER_SIZE, DEFAULT_ELEVATION_PROGRAM,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_SHELL_OPENER, RUNTIME_NAMESPACE,
    default_log_filter, default_log_format, default_pipe_endpoint, default_runtime_directory,
};
pub use endpoint::{ENDPOINT_NAME, EndpointParseError, EndpointPreparationError, PipeEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{LAUNCH_SETTINGS_FILE, RuntimePaths};

/// Resolved helper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "FULLTRUST")]
#[serde(default)]
pub struct Config {
    /// Location of the control channel endpoint.
    pub pipe_endpoint: PipeEndpoint,
    /// `tracing` filter directive applied to helper logs.
    pub log_filter: String,
    /// Output format for helper logs.
    pub log_format: LogFormat,
    /// Optional file receiving logs instead of stderr.
    pub log_file: Option<Utf8PathBuf>,
    /// Seconds to wait for the UI peer to connect.
    pub accept_timeout_secs: u64,
    /// Initial size of the read buffer.
    pub in_buffer_size: usize,
    /// Initial size of the write buffer.
    pub out_buffer_size: usize,
    /// Largest frame accepted from the peer.
    pub max_message_bytes: usize,
    /// Group standing in for the sandboxed UI's app-container identity.
    pub client_group: Option<String>,
    /// Privilege broker used to relaunch the helper elevated.
    pub elevation_program: String,
    /// Program that opens shell targets for one-shot launches.
    pub shell_opener: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipe_endpoint: default_pipe_endpoint(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            log_file: None,
            accept_timeout_secs: DEFAULT_ACCEPT_TIMEOUT_SECS,
            in_buffer_size: DEFAULT_BUFFER_SIZE,
            out_buffer_size: DEFAULT_BUFFER_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            client_group: None,
            elevation_program: DEFAULT_ELEVATION_PROGRAM.to_owned(),
            shell_opener: DEFAULT_SHELL_OPENER.to_owned(),
        }
    }
}

impl Config {
    /// Endpoint the helper binds.
    #[must_use]
    pub const fn pipe_endpoint(&self) -> &PipeEndpoint {
        &self.pipe_endpoint
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Log destination file, when logs should not go to stderr.
    #[must_use]
    pub fn log_file(&self) -> Option<&Utf8Path> {
        self.log_file.as_deref()
    }

    /// Bounded wait for the UI peer.
    #[must_use]
    pub const fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout_secs)
    }

    /// Initial read buffer size; never zero.
    #[must_use]
    pub fn in_buffer_size(&self) -> usize {
        self.in_buffer_size.max(1)
    }

    /// Initial write buffer size.
    #[must_use]
    pub const fn out_buffer_size(&self) -> usize {
        self.out_buffer_size
    }

    /// Largest accepted frame.
    #[must_use]
    pub const fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    /// Group granted app-container access, if configured.
    #[must_use]
    pub fn client_group(&self) -> Option<&str> {
        self.client_group.as_deref()
    }

    /// Privilege broker program.
    #[must_use]
    pub fn elevation_program(&self) -> &str {
        self.elevation_program.as_str()
    }

    /// Shell opener program.
    #[must_use]
    pub fn shell_opener(&self) -> &str {
        self.shell_opener.as_str()
    }
}
