//! Configuration loader placing the endpoint in a temporary directory.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoError;
use tempfile::TempDir;

use fulltrust_config::{Config, ENDPOINT_NAME, LogFormat, PipeEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that provisions the endpoint under a temporary directory.
pub struct TestConfigLoader {
    dir: Arc<TempDir>,
    accept_timeout_secs: u64,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: Arc::new(TempDir::new().expect("failed to create temporary directory")),
            accept_timeout_secs: 5,
        }
    }

    /// Shortens the wait for the peer.
    pub fn set_accept_timeout_secs(&mut self, seconds: u64) {
        self.accept_timeout_secs = seconds;
    }

    /// Directory holding the endpoint and the launch settings record.
    #[must_use]
    pub fn runtime_dir(&self) -> &Utf8Path {
        Utf8Path::from_path(self.dir.path()).expect("temporary directory was not valid UTF-8")
    }

    /// Path of the endpoint socket.
    #[must_use]
    pub fn endpoint_path(&self) -> Utf8PathBuf {
        self.runtime_dir().join(ENDPOINT_NAME)
    }

    /// The configuration handed to the helper.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            pipe_endpoint: PipeEndpoint::new(self.endpoint_path()),
            log_format: LogFormat::Compact,
            accept_timeout_secs: self.accept_timeout_secs,
            shell_opener: "true".to_owned(),
            ..Config::default()
        }
    }
}

impl Clone for TestConfigLoader {
    fn clone(&self) -> Self {
        Self {
            dir: Arc::clone(&self.dir),
            accept_timeout_secs: self.accept_timeout_secs,
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}
