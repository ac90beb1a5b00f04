//! Supervises helper launch sequencing and teardown.

use std::env;
use std::io;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use fulltrust_config::{Config, RuntimePaths};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{DispatchSupervisor, Dispatcher, HandlerRegistry};
use crate::elevation::{Elevation, ElevationController, SystemElevation, announce_successor};
use crate::handlers::default_handlers;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{
    AccessPolicy, BindOptions, Connection, PipeListener, ReadLoop, ReadLoopExit,
};

use super::errors::LaunchError;
use super::launch_mode::LaunchMode;
use super::one_shot::LaunchSettingsStore;
use super::panic_trap;
use super::shutdown::{ShutdownLatch, ShutdownReason, ShutdownSignal, SystemShutdownSignal};
use super::{LIFECYCLE_TARGET, LifecycleState, WORKER_DRAIN_TIMEOUT};

/// How a helper run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperOutcome {
    /// A one-shot launch request was handled; the endpoint was never bound.
    PendingLaunchHandled,
    /// The helper served the endpoint until the latch fired.
    Stopped(ShutdownReason),
}

impl HelperOutcome {
    /// Returns `false` when the run ended because of a failure.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !matches!(
            self,
            Self::Stopped(
                ShutdownReason::AcceptFailed(_)
                    | ShutdownReason::ReadFailed(_)
                    | ShutdownReason::HandlerInitFailed(_)
            )
        )
    }
}

/// Domain collaborators built from the resolved configuration.
pub trait HelperServices: Send + Sync {
    /// Privilege queries and relaunching.
    fn elevation(&self, config: &Config) -> Arc<dyn Elevation>;

    /// Handlers to register, in offer order.
    fn handlers(&self, config: &Config) -> HandlerRegistry;
}

/// Production collaborators: the configured privilege broker and the
/// built-in handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHelperServices;

impl HelperServices for SystemHelperServices {
    fn elevation(&self, config: &Config) -> Arc<dyn Elevation> {
        Arc::new(SystemElevation::new(
            config.elevation_program(),
            config.pipe_endpoint().clone(),
        ))
    }

    fn handlers(&self, config: &Config) -> HandlerRegistry {
        default_handlers(config)
    }
}

/// Process-level collaborators needed to control the helper lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) mode: LaunchMode,
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the helper runtime.
pub(crate) struct ServiceDeps<L, H> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) services: H,
}

/// Collaborators required to launch the helper runtime.
pub(crate) struct LaunchPlan<L, S, H> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L, H>,
}

/// Runs the helper using the production collaborators and process arguments.
pub fn run_helper() -> Result<HelperOutcome, LaunchError> {
    panic_trap::install();
    let (mode, args) = LaunchMode::split_arguments(env::args_os());
    let plan = LaunchPlan {
        process: ProcessControl {
            mode,
            shutdown: SystemShutdownSignal,
        },
        services: ServiceDeps {
            loader: SystemConfigLoader::new(args),
            reporter: Arc::new(StructuredHealthReporter::new()),
            services: SystemHelperServices,
        },
    };
    run_helper_with(plan)
}

/// Runs the helper with injected collaborators.
pub(crate) fn run_helper_with<L, S, H>(plan: LaunchPlan<L, S, H>) -> Result<HelperOutcome, LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    H: HelperServices,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { mode, shutdown } = process;
    let ServiceDeps {
        loader,
        reporter,
        services,
    } = services;

    reporter.state_changed(LifecycleState::Starting);
    let config = bootstrap_with(&loader, reporter.as_ref())?.into_config();
    info!(target: LIFECYCLE_TARGET, ?mode, "starting helper");

    let settings = LaunchSettingsStore::new(RuntimePaths::from_config(&config)?.launch_settings_path());
    if let Some(pending) = settings.take_pending()? {
        pending.run(config.shell_opener())?;
        reporter.state_changed(LifecycleState::Stopped);
        return Ok(HelperOutcome::PendingLaunchHandled);
    }

    if mode.is_elevated_relaunch() {
        // The predecessor holds the endpoint until it hears from us.
        announce_successor(config.pipe_endpoint());
    }

    let elevation = services.elevation(&config);
    let elevated = elevation.is_elevated();
    let policy = AccessPolicy::for_privilege(elevated);
    let registry = Arc::new(services.handlers(&config));
    config
        .pipe_endpoint()
        .prepare_filesystem(policy.directory_mode())?;
    let options = BindOptions {
        client_group: config.client_group().map(str::to_owned),
        in_use_wait: mode
            .is_elevated_relaunch()
            .then(|| config.accept_timeout()),
    };
    let listener = PipeListener::bind(config.pipe_endpoint(), &policy, &options)?;
    reporter.endpoint_bound(listener.endpoint(), elevated);

    let latch = ShutdownLatch::new();
    let watch = shutdown.watch(&latch)?;

    reporter.state_changed(LifecycleState::AcceptingConnection);
    let session = match listener.accept(config.accept_timeout(), || latch.is_set()) {
        Ok(stream) => {
            reporter.peer_connected();
            reporter.state_changed(LifecycleState::Running);
            match start_session(stream, &config, &registry, elevation, &latch) {
                Ok(session) => Some(session),
                Err(error) => {
                    warn!(target: LIFECYCLE_TARGET, error = %error, "failed to set up peer connection");
                    latch.fire(ShutdownReason::AcceptFailed(error.to_string()));
                    None
                }
            }
        }
        Err(error) => {
            reporter.accept_failed(&error);
            latch.fire(ShutdownReason::AcceptFailed(error.to_string()));
            None
        }
    };

    let reason = latch.wait();
    reporter.shutdown_requested(&reason);
    reporter.state_changed(LifecycleState::ShuttingDown);
    watch.stop();
    if let Some(session) = session {
        session.close();
    }
    // Workers are drained by now, so no handler is mid-`handle` when disposed.
    registry.dispose_all();
    drop(listener);
    reporter.state_changed(LifecycleState::Stopped);
    info!(target: LIFECYCLE_TARGET, reason = %reason, "shutdown sequence completed");
    Ok(HelperOutcome::Stopped(reason))
}

/// Live connection state owned by the lifecycle while running.
struct Session {
    connection: Arc<Connection>,
    reader: Option<JoinHandle<()>>,
    supervisor: Option<Arc<DispatchSupervisor>>,
}

impl Session {
    fn close(self) {
        self.connection.close();
        if let Some(reader) = self.reader
            && reader.join().is_err()
        {
            warn!(target: LIFECYCLE_TARGET, "reader thread panicked");
        }
        if let Some(supervisor) = self.supervisor {
            supervisor.drain(WORKER_DRAIN_TIMEOUT);
        }
    }
}

/// Initialises handlers and starts the reader for an accepted peer.
///
/// Failures after the connection exists fire the latch rather than
/// returning, so teardown still runs in order.
fn start_session(
    stream: UnixStream,
    config: &Config,
    registry: &Arc<HandlerRegistry>,
    elevation: Arc<dyn Elevation>,
    latch: &ShutdownLatch,
) -> io::Result<Session> {
    let connection = Arc::new(Connection::from_stream(&stream, config.out_buffer_size())?);
    let mut session = Session {
        connection: Arc::clone(&connection),
        reader: None,
        supervisor: None,
    };
    if let Err(error) = registry.initialize_all(&connection) {
        latch.fire(ShutdownReason::HandlerInitFailed(error.to_string()));
        return Ok(session);
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(registry),
        ElevationController::new(elevation, latch.clone()),
        latch.clone(),
    ));
    let supervisor = Arc::new(DispatchSupervisor::new(dispatcher, Arc::clone(&connection)));
    let reader = ReadLoop::new(stream, config.in_buffer_size(), config.max_message_bytes());
    let sink = Arc::clone(&supervisor);
    let reader_latch = latch.clone();
    let spawned = thread::Builder::new()
        .name("pipe-reader".to_owned())
        .spawn(move || {
            let exit = reader.run(|text| sink.submit(&text));
            connection.mark_disconnected();
            reader_latch.fire(shutdown_reason(exit));
        });
    match spawned {
        Ok(handle) => session.reader = Some(handle),
        Err(error) => {
            latch.fire(ShutdownReason::ReadFailed(error.to_string()));
        }
    }
    session.supervisor = Some(supervisor);
    Ok(session)
}

fn shutdown_reason(exit: ReadLoopExit) -> ShutdownReason {
    match exit {
        ReadLoopExit::Disconnected { partial_bytes } => {
            if partial_bytes {
                warn!(
                    target: LIFECYCLE_TARGET,
                    "peer disconnected in the middle of a message"
                );
            }
            ShutdownReason::PeerDisconnected
        }
        ReadLoopExit::Failed(error) => ShutdownReason::ReadFailed(error.to_string()),
        ReadLoopExit::Oversize(error) => ShutdownReason::ReadFailed(error.to_string()),
    }
}
