//! Relaunching the helper under elevated privileges.
//!
//! `Elevate` asks the helper to restart itself through a privilege broker.
//! The outcome is reported to the peer as a numeric `Success` code and, when
//! a successor was launched, the current instance shuts down so the
//! successor can take over the endpoint.

use std::time::Duration;

mod controller;
mod errors;
mod system;


pub use self::controller::{ElevationController, ElevationOutcome};
pub use self::errors::{ElevationError, RelaunchError};
pub use self::system::SystemElevation;
pub(crate) use self::system::{announce_successor, handover_path};

/// Marker argument passed to the elevated successor.
pub const ELEVATE_ARGUMENT: &str = "elevate";

/// How long the user may take to answer the privilege broker's prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

const ELEVATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::elevation");

/// Privilege queries and relaunching.
#[cfg_attr(test, mockall::automock)]
pub trait Elevation: Send + Sync {
    /// Returns `true` when the helper already runs with elevated privileges.
    fn is_elevated(&self) -> bool;

    /// Starts an elevated successor and returns once it is running.
    ///
    /// Returns [`RelaunchError::Declined`] when the user dismissed or did not
    /// answer the broker's prompt, or was not authorised.
    fn relaunch_elevated(&self) -> Result<(), RelaunchError>;
}
