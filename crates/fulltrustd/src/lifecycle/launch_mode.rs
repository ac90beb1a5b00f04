use std::ffi::OsString;

use crate::elevation::ELEVATE_ARGUMENT;

/// How the helper was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Started by the UI.
    Standard,
    /// Started by a previous instance through the privilege broker.
    ElevatedRelaunch,
}

impl LaunchMode {
    /// Detects the launch mode and strips the `elevate` marker.
    ///
    /// The marker is only recognised directly after the program name, so a
    /// flag value that happens to read `elevate` is left alone. The returned
    /// arguments still start with the program name.
    pub fn split_arguments<I>(args: I) -> (Self, Vec<OsString>)
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args: Vec<OsString> = args.into_iter().collect();
        let marked = args
            .get(1)
            .is_some_and(|arg| arg.as_os_str() == ELEVATE_ARGUMENT);
        if marked {
            args.remove(1);
            (Self::ElevatedRelaunch, args)
        } else {
            (Self::Standard, args)
        }
    }

    /// Returns `true` for a relaunch through the privilege broker.
    #[must_use]
    pub const fn is_elevated_relaunch(self) -> bool {
        matches!(self, Self::ElevatedRelaunch)
    }
}
