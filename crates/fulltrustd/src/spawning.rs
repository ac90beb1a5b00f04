//! Detached child process spawning.
//!
//! The helper starts applications, shell openers and its own elevated
//! successor without waiting for them. Each child is reaped on a background
//! thread so finished children never linger as zombies.

use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, warn};

const SPAWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::spawning");

/// Spawns `command` detached from the helper's standard streams.
///
/// Returns the child's pid once it has started.
pub(crate) fn spawn_detached(command: &mut Command, label: &str) -> io::Result<u32> {
    let child = spawn_watched(command, label)?;
    let pid = child.id();
    reap_in_background(child, label);
    Ok(pid)
}

/// Spawns `command` like [`spawn_detached`] but hands the child back so the
/// caller can observe an early exit before it is reaped.
pub(crate) fn spawn_watched(command: &mut Command, label: &str) -> io::Result<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit());
    let child = command.spawn()?;
    debug!(target: SPAWN_TARGET, label, pid = child.id(), "child process started");
    Ok(child)
}

/// Waits for `child` on a background thread, logging its exit status.
pub(crate) fn reap_in_background(mut child: Child, label: &str) {
    let owned_label = label.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("reap-{}", child.id()))
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => {
                debug!(target: SPAWN_TARGET, label = %owned_label, %status, "child process exited");
            }
            Ok(status) => {
                warn!(target: SPAWN_TARGET, label = %owned_label, %status, "child process exited unsuccessfully");
            }
            Err(error) => {
                warn!(target: SPAWN_TARGET, label = %owned_label, error = %error, "failed to wait for child process");
            }
        });
    if let Err(error) = spawned {
        warn!(
            target: SPAWN_TARGET,
            label,
            error = %error,
            "failed to start reaper thread"
        );
    }
}
