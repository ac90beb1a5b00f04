//! Built-in message handlers.

mod application;

pub use self::application::{APPLICATION_LAUNCH_COMMAND, ApplicationLaunchHandler};

use fulltrust_config::Config;

use crate::dispatch::HandlerRegistry;

const HANDLERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handlers");

/// Registry holding the handlers the helper ships with, in fixed order.
#[must_use]
pub fn default_handlers(_config: &Config) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(ApplicationLaunchHandler::new()));
    registry
}
