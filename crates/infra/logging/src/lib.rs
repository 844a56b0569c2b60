//! Process-wide logging init, shared by every binary in the workspace.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a global `tracing` subscriber reading `RUST_LOG` (default `info`).
/// Idempotent in the sense that a second call is a silent no-op rather than a
/// panic, since extension-loaded binaries may call it more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
