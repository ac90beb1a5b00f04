//! Derives runtime artefact paths from the configured endpoint.
//!
//! The one-shot launch settings record lives beside the endpoint so the UI
//! and the helper agree on its location without extra configuration.

use camino::{Utf8Path, Utf8PathBuf};

use crate::{Config, EndpointPreparationError};

/// File name of the persisted one-shot launch record.
pub const LAUNCH_SETTINGS_FILE: &str = "launch-settings.json";

/// Canonical paths for artefacts shared between the UI and the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    runtime_dir: Utf8PathBuf,
    launch_settings_path: Utf8PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the configuration.
    pub fn from_config(config: &Config) -> Result<Self, EndpointPreparationError> {
        let runtime_dir = config.pipe_endpoint().parent()?.to_path_buf();
        Ok(Self {
            launch_settings_path: runtime_dir.join(LAUNCH_SETTINGS_FILE),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Utf8Path {
        self.runtime_dir.as_path()
    }

    /// Path to the one-shot launch settings record.
    #[must_use]
    pub fn launch_settings_path(&self) -> &Utf8Path {
        self.launch_settings_path.as_path()
    }
}
