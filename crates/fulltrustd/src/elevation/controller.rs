use std::sync::Arc;

use tracing::{error, info, warn};

use fulltrust_envelope::{Envelope, SUCCESS_KEY};

use super::{ELEVATION_TARGET, Elevation, ElevationError, RelaunchError};
use crate::lifecycle::{ShutdownLatch, ShutdownReason};
use crate::transport::Connection;

/// Result of one `Elevate` request, as reported to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationOutcome {
    /// An elevated successor was started.
    Relaunched,
    /// The user declined the elevation prompt.
    Declined,
    /// The helper was already elevated; nothing was started.
    AlreadyElevated,
}

impl ElevationOutcome {
    /// Value written to the reply's `Success` field.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Relaunched => 0,
            Self::Declined => 1,
            Self::AlreadyElevated => -1,
        }
    }
}

/// Runs the elevation handshake for `Elevate` commands.
#[derive(Clone)]
pub struct ElevationController {
    elevation: Arc<dyn Elevation>,
    shutdown: ShutdownLatch,
}

impl ElevationController {
    /// Creates a controller that fires `shutdown` after a successful relaunch.
    pub fn new(elevation: Arc<dyn Elevation>, shutdown: ShutdownLatch) -> Self {
        Self {
            elevation,
            shutdown,
        }
    }

    /// Handles one `Elevate` request and replies on `connection`.
    ///
    /// After a successful relaunch shutdown fires even if the reply could not
    /// be written, since the successor is already waiting for the endpoint.
    pub fn handle(
        &self,
        connection: &Connection,
        request: &Envelope,
    ) -> Result<ElevationOutcome, ElevationError> {
        if self.elevation.is_elevated() {
            info!(target: ELEVATION_TARGET, "helper already elevated");
            reply(connection, request, ElevationOutcome::AlreadyElevated)?;
            return Ok(ElevationOutcome::AlreadyElevated);
        }

        match self.elevation.relaunch_elevated() {
            Ok(()) => {
                info!(target: ELEVATION_TARGET, "elevated successor started");
                let replied = reply(connection, request, ElevationOutcome::Relaunched);
                self.shutdown.fire(ShutdownReason::Elevated);
                replied?;
                Ok(ElevationOutcome::Relaunched)
            }
            Err(RelaunchError::Declined { program }) => {
                warn!(target: ELEVATION_TARGET, program, "elevation declined");
                reply(connection, request, ElevationOutcome::Declined)?;
                Ok(ElevationOutcome::Declined)
            }
            Err(other) => {
                error!(target: ELEVATION_TARGET, error = %other, "elevated relaunch failed");
                Err(ElevationError::Relaunch(other))
            }
        }
    }
}

impl std::fmt::Debug for ElevationController {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ElevationController")
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

fn reply(
    connection: &Connection,
    request: &Envelope,
    outcome: ElevationOutcome,
) -> Result<(), ElevationError> {
    connection.reply(request, Envelope::new().with(SUCCESS_KEY, outcome.code()))?;
    Ok(())
}
