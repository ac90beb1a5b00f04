use std::fmt;
use std::fs::{self, DirBuilder};
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Well-known name of the control channel endpoint.
pub const ENDPOINT_NAME: &str = "FilesInteropService_ServerPipe";

/// Location of the local control channel endpoint.
///
/// Renders as `unix://PATH` and parses from that form or from a bare
/// absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PipeEndpoint {
    path: Utf8PathBuf,
}

impl PipeEndpoint {
    /// Builds an endpoint at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Builds the well-known endpoint inside `directory`.
    #[must_use]
    pub fn in_directory(directory: impl AsRef<Utf8Path>) -> Self {
        Self::new(directory.as_ref().join(ENDPOINT_NAME))
    }

    /// Filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    /// Directory that holds the socket.
    pub fn parent(&self) -> Result<&Utf8Path, EndpointPreparationError> {
        self.path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| EndpointPreparationError::MissingParent {
                path: self.path.clone(),
            })
    }

    /// Ensures the socket's parent directory exists.
    ///
    /// Newly created directories receive `mode`; an existing directory keeps
    /// its owner but gains the traverse bits in `mode` so every principal
    /// granted access to the socket can reach it.
    pub fn prepare_filesystem(&self, mode: u32) -> Result<(), EndpointPreparationError> {
        let parent = self.parent()?;

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(EndpointPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        #[cfg(unix)]
        widen_traverse_bits(parent, mode)?;
        Ok(())
    }
}

#[cfg(unix)]
fn widen_traverse_bits(directory: &Utf8Path, mode: u32) -> Result<(), EndpointPreparationError> {
    use std::os::unix::fs::PermissionsExt;

    let adjust = |source| EndpointPreparationError::AdjustPermissions {
        path: directory.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(directory.as_std_path()).map_err(adjust)?;
    let current = metadata.permissions().mode() & 0o7777;
    let wanted = current | (mode & 0o111);
    if wanted != current {
        fs::set_permissions(directory.as_std_path(), fs::Permissions::from_mode(wanted))
            .map_err(adjust)?;
    }
    Ok(())
}

impl fmt::Display for PipeEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unix://{}", self.path)
    }
}

impl FromStr for PipeEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.starts_with('/') {
            return Ok(Self::new(input));
        }
        let url = Url::parse(input)?;
        if url.scheme() != "unix" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let path = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|_| EndpointParseError::InvalidPath(input.to_owned()))?;
        if path.is_empty() || path == "/" {
            return Err(EndpointParseError::MissingPath(input.to_owned()));
        }
        Ok(Self::new(path.as_ref()))
    }
}

impl TryFrom<String> for PipeEndpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PipeEndpoint> for String {
    fn from(value: PipeEndpoint) -> Self {
        value.to_string()
    }
}

/// Errors encountered while parsing a [`PipeEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `unix`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// The URL carried no socket path.
    #[error("missing socket path in '{0}'")]
    MissingPath(String),
    /// The socket path was not valid UTF-8 once decoded.
    #[error("socket path in '{0}' is not valid UTF-8")]
    InvalidPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing the endpoint directory.
#[derive(Debug, Error)]
pub enum EndpointPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Offending socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Failed to widen the directory's traverse permissions.
    #[error("failed to adjust permissions on '{path}': {source}")]
    AdjustPermissions {
        /// Directory whose mode could not be changed.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
