//! Scenario world running a helper on a background thread with a test peer.

use std::fs;
use std::io;
use std::os::unix::net::UnixListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fulltrust_config::{LAUNCH_SETTINGS_FILE, PipeEndpoint};
use fulltrust_envelope::Envelope;

use crate::elevation::handover_path;
use crate::health::HealthReporter;
use crate::lifecycle::{
    HelperOutcome, LaunchError, LaunchMode, LaunchPlan, ProcessControl, ServiceDeps,
    ShutdownReason, run_helper_with,
};

use super::{PeerClient, RecordingHealthReporter, TestConfigLoader, TestServices, TestShutdownSignal};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type HelperRun = Result<HelperOutcome, LaunchError>;

/// Scenario world shared across helper BDD steps.
pub struct HelperWorld {
    pub loader: TestConfigLoader,
    pub services: TestServices,
    pub reporter: Arc<RecordingHealthReporter>,
    pub shutdown: TestShutdownSignal,
    pub mode: LaunchMode,
    pub last_reply: Option<Envelope>,
    handover: Option<UnixListener>,
    peer: Option<PeerClient>,
    handle: Option<JoinHandle<HelperRun>>,
    result: Option<HelperRun>,
}

impl HelperWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            services: TestServices::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            shutdown: TestShutdownSignal::default(),
            mode: LaunchMode::Standard,
            last_reply: None,
            handover: None,
            peer: None,
            handle: None,
            result: None,
        }
    }

    /// Starts the helper on a background thread.
    pub fn start(&mut self) -> Result<(), String> {
        if self.handle.is_some() {
            return Err("helper already running".to_owned());
        }
        let plan = LaunchPlan {
            process: ProcessControl {
                mode: self.mode,
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: Arc::clone(&self.reporter) as Arc<dyn HealthReporter>,
                services: self.services.clone(),
            },
        };
        self.handle = Some(thread::spawn(move || run_helper_with(plan)));
        Ok(())
    }

    /// Connects the test peer to the helper's endpoint.
    pub fn connect_peer(&mut self) -> Result<(), String> {
        let peer = PeerClient::connect(&self.loader.endpoint_path(), WAIT_TIMEOUT)
            .map_err(|error| format!("peer failed to connect: {error}"))?;
        self.peer = Some(peer);
        self.wait_for(|world| world.services.events().len() >= world.initialised_handlers())
    }

    /// Sends the messages back-to-back in a single write.
    pub fn send(&mut self, messages: &[String]) -> Result<(), String> {
        self.peer_mut()?
            .send_all(messages)
            .map_err(|error| format!("failed to send: {error}"))
    }

    /// Waits for the next reply from the helper.
    pub fn receive_reply(&mut self) -> Result<(), String> {
        let reply = self
            .peer_mut()?
            .next_reply(WAIT_TIMEOUT)
            .map_err(|error| format!("failed to read reply: {error}"))?;
        self.last_reply = Some(reply.ok_or("no reply arrived")?);
        Ok(())
    }

    /// Reads everything the helper wrote before closing the connection.
    pub fn bytes_until_closed(&mut self) -> Result<Vec<u8>, String> {
        self.peer_mut()?
            .drain_until_closed(WAIT_TIMEOUT)
            .map_err(|error| format!("failed to drain connection: {error}"))
    }

    /// Closes the peer's end of the connection.
    pub fn disconnect_peer(&mut self) -> Result<(), String> {
        self.peer_mut()?.disconnect();
        Ok(())
    }

    /// Fires the helper's shutdown latch as a termination signal would.
    pub fn signal_shutdown(&self, signal: i32) -> Result<(), String> {
        let latch = self.shutdown.latch().ok_or("helper is not watching signals")?;
        latch.fire(ShutdownReason::Signal(signal));
        Ok(())
    }

    /// Waits for the helper thread to finish and records its result.
    pub fn wait_for_stop(&mut self) -> Result<(), String> {
        let handle = self.handle.take().ok_or("helper was not started")?;
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                self.handle = Some(handle);
                return Err("helper did not stop in time".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        let result = handle
            .join()
            .map_err(|_| "helper thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    /// Returns `true` while the helper thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Outcome of the finished helper run.
    pub fn outcome(&self) -> Result<&HelperOutcome, String> {
        match self.result.as_ref() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(error)) => Err(format!("helper failed: {error}")),
            None => Err("helper has not stopped".to_owned()),
        }
    }

    /// Shutdown reason recorded by the finished helper run.
    pub fn stop_reason(&self) -> Result<ShutdownReason, String> {
        match self.outcome()? {
            HelperOutcome::Stopped(reason) => Ok(reason.clone()),
            other => Err(format!("helper did not serve the endpoint: {other:?}")),
        }
    }

    /// Writes the one-shot launch settings record.
    pub fn write_launch_settings(&self, text: &str) -> Result<(), String> {
        fs::write(self.launch_settings_path(), text)
            .map_err(|error| format!("failed to write launch settings: {error}"))
    }

    /// Reads the one-shot launch settings record back.
    pub fn launch_settings(&self) -> Result<String, String> {
        fs::read_to_string(self.launch_settings_path())
            .map_err(|error| format!("failed to read launch settings: {error}"))
    }

    /// Opens the handover socket a predecessor listens on during a relaunch.
    pub fn await_handover(&mut self) -> Result<(), String> {
        let path = handover_path(&PipeEndpoint::new(self.loader.endpoint_path()));
        let listener = UnixListener::bind(path.as_std_path())
            .map_err(|error| format!("failed to open handover socket: {error}"))?;
        listener
            .set_nonblocking(true)
            .map_err(|error| format!("failed to configure handover socket: {error}"))?;
        self.handover = Some(listener);
        Ok(())
    }

    /// Returns `true` once the helper has connected to the handover socket.
    pub fn handover_announced(&self) -> Result<bool, String> {
        let listener = self.handover.as_ref().ok_or("no handover socket is open")?;
        match listener.accept() {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(error) => Err(format!("handover accept failed: {error}")),
        }
    }

    /// Returns `true` when the endpoint socket file exists.
    #[must_use]
    pub fn endpoint_exists(&self) -> bool {
        self.loader.endpoint_path().exists()
    }

    /// Polls until `done` holds or the wait times out.
    pub fn wait_for(&self, done: impl Fn(&Self) -> bool) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !done(self) {
            if Instant::now() >= deadline {
                return Err("condition not reached in time".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    fn initialised_handlers(&self) -> usize {
        if self.services.refusing_handler { 0 } else { 2 }
    }

    fn launch_settings_path(&self) -> camino::Utf8PathBuf {
        self.loader.runtime_dir().join(LAUNCH_SETTINGS_FILE)
    }

    fn peer_mut(&mut self) -> Result<&mut PeerClient, String> {
        self.peer.as_mut().ok_or_else(|| "peer is not connected".to_owned())
    }
}

impl Drop for HelperWorld {
    fn drop(&mut self) {
        if let Some(latch) = self.shutdown.latch() {
            latch.fire(ShutdownReason::TerminateRequested);
        }
        if let Some(peer) = &self.peer {
            peer.disconnect();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
