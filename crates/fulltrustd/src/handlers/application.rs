//! `LaunchApp`: starts a desktop application on behalf of the UI.

use std::process::Command;

use tracing::{info, warn};

use fulltrust_envelope::{Envelope, SUCCESS_KEY};

use super::HANDLERS_TARGET;
use crate::dispatch::{HandlerError, MessageHandler};
use crate::spawning::spawn_detached;
use crate::transport::Connection;

/// Command name served by [`ApplicationLaunchHandler`].
pub const APPLICATION_LAUNCH_COMMAND: &str = "LaunchApp";

const APPLICATION_KEY: &str = "Application";
const PARAMETERS_KEY: &str = "Parameters";
const WORKING_DIRECTORY_KEY: &str = "WorkingDirectory";

/// Spawns the requested application and reports whether it started.
///
/// `Parameters` is split on whitespace. The reply is `{"Success": true}`
/// once the process is running and `{"Success": false}` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplicationLaunchHandler;

impl ApplicationLaunchHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageHandler for ApplicationLaunchHandler {
    fn name(&self) -> &str {
        "application-launch"
    }

    fn handle(
        &self,
        connection: &Connection,
        message: &Envelope,
        command: &str,
    ) -> Result<(), HandlerError> {
        if command != APPLICATION_LAUNCH_COMMAND {
            return Ok(());
        }
        let started = match launch_request(message) {
            Ok(mut request) => match spawn_detached(&mut request, APPLICATION_LAUNCH_COMMAND) {
                Ok(pid) => {
                    info!(target: HANDLERS_TARGET, pid, "application started");
                    true
                }
                Err(error) => {
                    warn!(target: HANDLERS_TARGET, error = %error, "application failed to start");
                    false
                }
            },
            Err(error) => {
                warn!(target: HANDLERS_TARGET, error = %error, "invalid launch request");
                false
            }
        };
        connection.reply(message, Envelope::new().with(SUCCESS_KEY, started))?;
        Ok(())
    }
}

fn launch_request(message: &Envelope) -> Result<Command, HandlerError> {
    let application = message
        .get_str(APPLICATION_KEY)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(HandlerError::invalid_field(APPLICATION_KEY, "a non-empty string"))?;
    let mut command = Command::new(application);
    if let Some(value) = message.get(PARAMETERS_KEY) {
        let parameters = value
            .as_str()
            .ok_or(HandlerError::invalid_field(PARAMETERS_KEY, "a string"))?;
        command.args(parameters.split_whitespace());
    }
    if let Some(value) = message.get(WORKING_DIRECTORY_KEY) {
        let directory = value
            .as_str()
            .ok_or(HandlerError::invalid_field(WORKING_DIRECTORY_KEY, "a string"))?;
        if !directory.is_empty() {
            command.current_dir(directory);
        }
    }
    Ok(command)
}
