/// Command names handled by the dispatcher itself.
pub const TERMINATE_COMMAND: &str = "Terminate";
/// Command requesting an elevated relaunch.
pub const ELEVATE_COMMAND: &str = "Elevate";

/// Routing decision for a command name.
///
/// Matching is case-sensitive: `terminate` is an ordinary handler command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Stop the helper.
    Terminate,
    /// Relaunch the helper elevated.
    Elevate,
    /// Offered to every registered handler.
    Handler(&'a str),
}

impl<'a> Command<'a> {
    /// Classifies a command name.
    #[must_use]
    pub fn parse(name: &'a str) -> Self {
        match name {
            TERMINATE_COMMAND => Self::Terminate,
            ELEVATE_COMMAND => Self::Elevate,
            other => Self::Handler(other),
        }
    }
}
