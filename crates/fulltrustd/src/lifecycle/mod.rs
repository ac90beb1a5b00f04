//! Helper process lifecycle: startup, the single shutdown latch and teardown.

mod errors;
mod launch;
mod launch_mode;
mod one_shot;
pub(crate) mod panic_trap;
mod shutdown;

use std::fmt;
use std::time::Duration;

pub use self::errors::LaunchError;
pub use self::launch::{HelperOutcome, HelperServices, SystemHelperServices, run_helper};
pub(crate) use self::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_helper_with};
pub use self::launch_mode::LaunchMode;
pub use self::one_shot::{LaunchSettingsStore, OneShotError, PendingLaunch};
pub use self::shutdown::{
    ShutdownError, ShutdownLatch, ShutdownReason, ShutdownSignal, SignalWatch,
    SystemShutdownSignal,
};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Upper bound on waiting for in-flight dispatch workers during teardown.
pub(crate) const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Observable helper states, reported through the health reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Loading configuration and binding the endpoint.
    Starting,
    /// Waiting for the UI to connect.
    AcceptingConnection,
    /// Reading and dispatching messages.
    Running,
    /// Disposing handlers and closing the connection.
    ShuttingDown,
    /// Teardown finished.
    Stopped,
}

impl LifecycleState {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::AcceptingConnection => "accepting_connection",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
