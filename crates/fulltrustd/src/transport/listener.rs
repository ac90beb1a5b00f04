//! Binds the control channel endpoint and waits for the peer.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use nix::unistd::{Group, chown};
use tracing::{info, warn};

use fulltrust_config::PipeEndpoint;

use super::{AccessPolicy, ListenerError, TRANSPORT_TARGET};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const IN_USE_BACKOFF: Duration = Duration::from_millis(100);

/// Options controlling how the endpoint is bound.
#[derive(Debug, Clone, Default)]
pub(crate) struct BindOptions {
    /// Group assigned to the socket for the app-container rule.
    pub(crate) client_group: Option<String>,
    /// How long to keep retrying while another helper still holds the path.
    pub(crate) in_use_wait: Option<Duration>,
}

/// Listener bound to the well-known endpoint.
///
/// The socket file is removed when the listener is dropped.
#[derive(Debug)]
pub(crate) struct PipeListener {
    endpoint: PipeEndpoint,
    listener: UnixListener,
}

impl PipeListener {
    pub(crate) fn bind(
        endpoint: &PipeEndpoint,
        policy: &AccessPolicy,
        options: &BindOptions,
    ) -> Result<Self, ListenerError> {
        let path = endpoint.path().as_std_path();
        let listener = bind_with_retry(path, options.in_use_wait)?;
        let bound = Self {
            endpoint: endpoint.clone(),
            listener,
        };
        apply_policy(path, policy, options.client_group.as_deref())?;
        info!(
            target: TRANSPORT_TARGET,
            endpoint = %bound.endpoint,
            mode = format_args!("{:o}", policy.socket_mode()),
            "endpoint bound"
        );
        Ok(bound)
    }

    pub(crate) const fn endpoint(&self) -> &PipeEndpoint {
        &self.endpoint
    }

    /// Waits up to `timeout` for the peer to connect.
    ///
    /// `cancelled` is polled between attempts so a shutdown request can
    /// abandon the wait early.
    pub(crate) fn accept(
        &self,
        timeout: Duration,
        cancelled: impl Fn() -> bool,
    ) -> Result<UnixStream, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    stream
                        .set_nonblocking(false)
                        .map_err(|source| ListenerError::Accept { source })?;
                    info!(target: TRANSPORT_TARGET, "peer connected");
                    return Ok(stream);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(ListenerError::Accept { source }),
            }
            if cancelled() {
                return Err(ListenerError::AcceptCancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ListenerError::AcceptTimeout { timeout });
            }
            thread::sleep(ACCEPT_BACKOFF.min(deadline - now));
        }
    }
}

impl Drop for PipeListener {
    fn drop(&mut self) {
        let path = self.endpoint.path();
        if let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                path = %path,
                "failed to remove endpoint socket file"
            );
        }
    }
}

fn bind_with_retry(path: &Path, in_use_wait: Option<Duration>) -> Result<UnixListener, ListenerError> {
    let deadline = in_use_wait.map(|wait| Instant::now() + wait);
    loop {
        match bind_unix(path) {
            Err(ListenerError::EndpointInUse { path: in_use })
                if deadline.is_some_and(|limit| Instant::now() < limit) =>
            {
                info!(
                    target: TRANSPORT_TARGET,
                    path = %in_use,
                    "endpoint still held by previous helper; retrying"
                );
                thread::sleep(IN_USE_BACKOFF);
            }
            result => return result,
        }
    }
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::EndpointInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

fn apply_policy(
    path: &Path,
    policy: &AccessPolicy,
    client_group: Option<&str>,
) -> Result<(), ListenerError> {
    let permissions = |source| ListenerError::Permissions {
        path: path.display().to_string(),
        source,
    };
    if let Some(name) = client_group {
        let group = Group::from_name(name)
            .map_err(|errno| permissions(io::Error::from(errno)))?
            .ok_or_else(|| ListenerError::UnknownGroup {
                group: name.to_owned(),
            })?;
        chown(path, None, Some(group.gid)).map_err(|errno| permissions(io::Error::from(errno)))?;
    }
    fs::set_permissions(path, fs::Permissions::from_mode(policy.socket_mode()))
        .map_err(permissions)?;
    if policy.allows_connect(super::Principal::Everyone) {
        warn!(
            target: TRANSPORT_TARGET,
            path = %path.display(),
            "endpoint open to every local account while elevated"
        );
    }
    Ok(())
}
