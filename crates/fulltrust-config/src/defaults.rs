use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::endpoint::PipeEndpoint;
use crate::logging::LogFormat;

/// Directory beneath the runtime base that holds helper artefacts.
pub const RUNTIME_NAMESPACE: &str = "files";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds to wait for the UI peer to connect.
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 10;

/// Initial size of the connection's read and write buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Largest frame accepted from the peer.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Program used to relaunch the helper with elevated privileges.
pub const DEFAULT_ELEVATION_PROGRAM: &str = "pkexec";

/// Program used to open shell targets for one-shot launches.
pub const DEFAULT_SHELL_OPENER: &str = "xdg-open";

/// Default log filter expression used by the helper.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the helper.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default endpoint for the helper.
///
/// The endpoint lives in the user runtime directory when one exists and in a
/// uid-namespaced temporary directory otherwise.
#[must_use]
pub fn default_pipe_endpoint() -> PipeEndpoint {
    PipeEndpoint::in_directory(default_runtime_directory())
}

/// Directory holding the endpoint and launch settings by default.
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push(RUNTIME_NAMESPACE);
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    String::from("shared")
}
