use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats understood by the helper's log subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for log collectors and support bundles.
    #[default]
    Json,
    /// Single-line human-readable events for interactive debugging.
    Compact,
}

/// Failure raised when text names no known [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
