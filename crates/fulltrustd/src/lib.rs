//! Full-trust helper serving the file manager UI's control channel.
//!
//! The sandboxed UI cannot perform privileged or unrestricted operations
//! itself, so it talks to this helper over a local endpoint. The helper
//! binds the endpoint with access rules derived from its own privilege
//! level, accepts a single peer within a bounded wait, and reads
//! length-prefixed JSON envelopes from it. Each envelope is dispatched on its
//! own supervised worker: `Terminate` stops the helper, `Elevate` relaunches
//! it through a privilege broker, and every other command is offered to the
//! registered [`MessageHandler`]s.
//!
//! Every shutdown path funnels through a single [`ShutdownLatch`]. The first
//! reason to fire wins; teardown then disposes handlers in reverse order,
//! closes the connection and removes the endpoint.
//!
//! Before binding, the helper checks for a one-shot launch request left by
//! the UI and, when one is pending, carries it out and exits instead.

#[cfg(not(unix))]
compile_error!("fulltrustd binds a Unix domain socket and only supports Unix targets");

mod bootstrap;
mod dispatch;
mod elevation;
mod handlers;
mod health;
mod lifecycle;
mod spawning;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use dispatch::{
    Command, DispatchError, Dispatcher, HandlerError, HandlerInitError, HandlerRegistry,
    MessageHandler,
};
pub use elevation::{
    ELEVATE_ARGUMENT, Elevation, ElevationController, ElevationError, ElevationOutcome,
    RelaunchError, SystemElevation,
};
pub use handlers::{APPLICATION_LAUNCH_COMMAND, ApplicationLaunchHandler, default_handlers};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{
    HelperOutcome, HelperServices, LaunchError, LaunchMode, LaunchSettingsStore, LifecycleState,
    OneShotError, PendingLaunch, ShutdownError, ShutdownLatch, ShutdownReason, ShutdownSignal,
    SignalWatch, SystemHelperServices, SystemShutdownSignal, run_helper,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    AccessPolicy, AccessRights, AccessRule, Connection, ConnectionError, ListenerError, Principal,
};

#[cfg(test)]
mod tests;
