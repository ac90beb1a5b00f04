//! Process-wide panic logging.

use std::panic;

use once_cell::sync::OnceCell;
use tracing::error;

use super::LIFECYCLE_TARGET;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs a panic hook that logs the panic before the previous hook runs.
///
/// Repeated calls are no-ops.
pub(crate) fn install() {
    INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|location| format!("{}:{}", location.file(), location.line()));
            error!(
                target: LIFECYCLE_TARGET,
                thread = thread.name().unwrap_or("<unnamed>"),
                location = location.as_deref().unwrap_or("<unknown>"),
                payload = %crate::dispatch::describe_panic(info.payload()),
                "fatal panic"
            );
            previous(info);
        }));
    });
}
