//! One-shot launch requests persisted by the UI.
//!
//! Before binding the endpoint the helper checks the launch settings record.
//! A pending `ShellCommand` is consumed, its target opened, and the helper
//! exits without serving the control channel.

use std::fs;
use std::io;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{info, warn};

use fulltrust_envelope::{CodecError, Envelope, Value, decode, encode};

use super::LIFECYCLE_TARGET;
use crate::spawning::spawn_detached;

const SHELL_COMMAND: &str = "ShellCommand";
const PID_KEY: &str = "pid";

/// Errors raised while consuming the launch settings record.
#[derive(Debug, Error)]
pub enum OneShotError {
    /// The record exists but could not be read.
    #[error("failed to read launch settings '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The record is not a valid envelope.
    #[error("launch settings '{path}' are malformed: {source}")]
    Decode {
        path: Utf8PathBuf,
        #[source]
        source: CodecError,
    },
    /// The consumed record could not be written back.
    #[error("failed to update launch settings '{path}': {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// Re-encoding the remaining settings failed.
    #[error("failed to encode launch settings: {0}")]
    Encode(#[source] CodecError),
    /// The requesting process could not be terminated.
    #[error("failed to terminate process {pid}: {source}")]
    Terminate {
        pid: i32,
        #[source]
        source: Errno,
    },
    /// The shell opener could not be started.
    #[error("failed to start shell opener '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A launch request found in the settings record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingLaunch {
    /// Open `target` with the shell opener after terminating `pid`.
    ShellCommand {
        target: Option<String>,
        pid: Option<i32>,
    },
}

impl PendingLaunch {
    /// Carries out the request.
    pub fn run(&self, shell_opener: &str) -> Result<(), OneShotError> {
        let Self::ShellCommand { target, pid } = self;
        if let Some(pid) = *pid {
            terminate(pid)?;
        }
        match target {
            Some(target) => {
                let mut command = Command::new(shell_opener);
                command.arg(target);
                spawn_detached(&mut command, SHELL_COMMAND).map_err(|source| {
                    OneShotError::Spawn {
                        program: shell_opener.to_owned(),
                        source,
                    }
                })?;
                info!(target: LIFECYCLE_TARGET, opened = %target, "shell command opened");
            }
            None => warn!(target: LIFECYCLE_TARGET, "shell command without a target"),
        }
        Ok(())
    }
}

fn terminate(pid: i32) -> Result<(), OneShotError> {
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {
            info!(target: LIFECYCLE_TARGET, pid, "requesting process terminated");
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(OneShotError::Terminate { pid, source }),
    }
}

/// File-backed launch settings record.
#[derive(Debug, Clone)]
pub struct LaunchSettingsStore {
    path: Utf8PathBuf,
}

impl LaunchSettingsStore {
    /// Creates a store over the record at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the record, returning `None` when it does not exist.
    pub fn load(&self) -> Result<Option<Envelope>, OneShotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(OneShotError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        decode(&bytes)
            .map(Some)
            .map_err(|source| OneShotError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// Consumes a pending launch request.
    ///
    /// The command marker is removed and the remaining settings written back
    /// before the request is returned, so a request is seen at most once.
    pub fn take_pending(&self) -> Result<Option<PendingLaunch>, OneShotError> {
        let Some(mut settings) = self.load()? else {
            return Ok(None);
        };
        if settings.command().and_then(Value::as_str) != Some(SHELL_COMMAND) {
            return Ok(None);
        }
        settings.remove(fulltrust_envelope::COMMAND_KEY);
        self.store(&settings)?;
        Ok(Some(PendingLaunch::ShellCommand {
            target: settings.get(SHELL_COMMAND).and_then(target_of),
            pid: settings.get(PID_KEY).and_then(pid_of),
        }))
    }

    fn store(&self, settings: &Envelope) -> Result<(), OneShotError> {
        let bytes = encode(settings).map_err(OneShotError::Encode)?;
        fs::write(&self.path, bytes).map_err(|source| OneShotError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Date-shaped targets decode as timestamps; they are still paths.
fn target_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Timestamp(stamp) => Some(stamp.to_iso8601()),
        _ => None,
    }
}

fn pid_of(value: &Value) -> Option<i32> {
    let pid: i32 = match value {
        Value::Integer(pid) => i32::try_from(*pid).ok()?,
        Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    (pid > 0).then_some(pid)
}
