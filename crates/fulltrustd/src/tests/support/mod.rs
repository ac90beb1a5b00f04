//! Test harness utilities for the helper behavioural suites.

mod config_loader;
mod peer;
mod reporter;
mod services;
mod world;

pub use config_loader::TestConfigLoader;
pub use peer::PeerClient;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use services::{HandlerEvent, RelaunchBehaviour, TestServices, TestShutdownSignal};
pub use world::HelperWorld;
