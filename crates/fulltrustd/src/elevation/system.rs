use std::env;
use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use nix::unistd::geteuid;
use tracing::{debug, info, warn};

use fulltrust_config::PipeEndpoint;

use super::{ELEVATE_ARGUMENT, ELEVATION_TARGET, Elevation, PROMPT_TIMEOUT, RelaunchError};
use crate::spawning::{reap_in_background, spawn_watched};

const HANDOVER_POLL: Duration = Duration::from_millis(50);

/// Exit codes `pkexec` uses when the prompt was dismissed or authorisation
/// was refused.
const BROKER_DECLINED_CODES: [i32; 2] = [126, 127];

/// Elevation through an external privilege broker such as `pkexec`.
///
/// The helper counts as elevated when its effective uid is root. The
/// successor is started as `<program> <helper> elevate --pipe-endpoint <path>`
/// so it binds the endpoint the current instance is about to release.
///
/// A relaunch only counts once the successor is actually running: before
/// spawning the broker the helper opens a handover socket beside the
/// endpoint, and the successor connects to it on startup (see
/// [`announce_successor`]). If the broker exits first, its status decides
/// between a declined prompt and a failure.
#[derive(Debug, Clone)]
pub struct SystemElevation {
    program: String,
    endpoint: PipeEndpoint,
    prompt_timeout: Duration,
}

impl SystemElevation {
    /// Creates an elevation seam using `program` as the privilege broker.
    pub fn new(program: impl Into<String>, endpoint: PipeEndpoint) -> Self {
        Self {
            program: program.into(),
            endpoint,
            prompt_timeout: PROMPT_TIMEOUT,
        }
    }

    /// Overrides how long the user may take to answer the broker's prompt.
    #[must_use]
    pub const fn with_prompt_timeout(mut self, prompt_timeout: Duration) -> Self {
        self.prompt_timeout = prompt_timeout;
        self
    }

    fn relaunch_command(&self) -> Result<Command, RelaunchError> {
        let helper = env::current_exe().map_err(|source| RelaunchError::CurrentExe { source })?;
        let mut command = Command::new(&self.program);
        command
            .arg(helper)
            .arg(ELEVATE_ARGUMENT)
            .arg("--pipe-endpoint")
            .arg(self.endpoint.path().as_str());
        Ok(command)
    }

    fn declined(&self) -> RelaunchError {
        RelaunchError::Declined {
            program: self.program.clone(),
        }
    }

    fn spawn_failed(&self, source: io::Error) -> RelaunchError {
        RelaunchError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    /// Waits until the successor announces itself, the broker exits, or the
    /// prompt times out.
    fn await_successor(&self, mut broker: Child, handover: &Handover) -> Result<(), RelaunchError> {
        let deadline = Instant::now() + self.prompt_timeout;
        loop {
            if handover.successor_arrived() {
                info!(target: ELEVATION_TARGET, "elevated successor is running");
                reap_in_background(broker, "elevated successor");
                return Ok(());
            }
            match broker.try_wait() {
                Ok(Some(status)) => return Err(self.broker_exited(status)),
                Ok(None) => {}
                Err(source) => {
                    reap_in_background(broker, "privilege broker");
                    return Err(self.spawn_failed(source));
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    target: ELEVATION_TARGET,
                    timeout = ?self.prompt_timeout,
                    "elevation prompt unanswered; abandoning relaunch"
                );
                if let Err(error) = broker.kill() {
                    debug!(target: ELEVATION_TARGET, error = %error, "failed to stop privilege broker");
                }
                reap_in_background(broker, "privilege broker");
                return Err(self.declined());
            }
            thread::sleep(HANDOVER_POLL);
        }
    }

    fn broker_exited(&self, status: ExitStatus) -> RelaunchError {
        if status
            .code()
            .is_some_and(|code| BROKER_DECLINED_CODES.contains(&code))
        {
            info!(target: ELEVATION_TARGET, %status, "elevation declined");
            return self.declined();
        }
        self.spawn_failed(io::Error::other(format!(
            "privilege broker exited with {status} before the successor started"
        )))
    }
}

impl Elevation for SystemElevation {
    fn is_elevated(&self) -> bool {
        geteuid().is_root()
    }

    fn relaunch_elevated(&self) -> Result<(), RelaunchError> {
        let handover = Handover::open(&self.endpoint)?;
        let mut command = self.relaunch_command()?;
        let broker = match spawn_watched(&mut command, "privilege broker") {
            Ok(broker) => broker,
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                return Err(self.declined());
            }
            Err(source) => return Err(self.spawn_failed(source)),
        };
        self.await_successor(broker, &handover)
    }
}

/// Location of the handover socket for `endpoint`.
pub(crate) fn handover_path(endpoint: &PipeEndpoint) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}.handover", endpoint.path()))
}

/// Tells the instance that launched this one that the successor is running.
///
/// Absence of the handover socket is not an error: the helper may have been
/// started elevated by other means.
pub(crate) fn announce_successor(endpoint: &PipeEndpoint) {
    let path = handover_path(endpoint);
    match UnixStream::connect(path.as_std_path()) {
        Ok(_stream) => info!(target: ELEVATION_TARGET, path = %path, "announced elevated successor"),
        Err(error) => {
            debug!(target: ELEVATION_TARGET, path = %path, error = %error, "no handover socket to announce on");
        }
    }
}

/// One-shot listener the successor connects to once it runs.
struct Handover {
    path: Utf8PathBuf,
    listener: UnixListener,
}

impl Handover {
    fn open(endpoint: &PipeEndpoint) -> Result<Self, RelaunchError> {
        let path = handover_path(endpoint);
        let failed = |source| RelaunchError::Handover {
            path: path.to_string(),
            source,
        };
        match fs::remove_file(path.as_std_path()) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => return Err(failed(error)),
            _ => {}
        }
        let listener = UnixListener::bind(path.as_std_path()).map_err(failed)?;
        listener.set_nonblocking(true).map_err(failed)?;
        Ok(Self { path, listener })
    }

    fn successor_arrived(&self) -> bool {
        match self.listener.accept() {
            Ok(_) => true,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => false,
            Err(error) => {
                warn!(target: ELEVATION_TARGET, error = %error, "handover socket accept failed");
                false
            }
        }
    }
}

impl Drop for Handover {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(self.path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: ELEVATION_TARGET,
                path = %self.path,
                error = %error,
                "failed to remove handover socket"
            );
        }
    }
}
