//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the symboldb tracing/logging system.
///
/// Reads the `SYMBOLDB_LOG` environment variable for per-subsystem log
/// levels, e.g. `SYMBOLDB_LOG=symboldb_repo=debug,symboldb_storage=warn`.
///
/// Falls back to `symboldb=info` if `SYMBOLDB_LOG` is not set or invalid.
///
/// This function is idempotent; calling it multiple times is safe.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("SYMBOLDB_LOG")
            .unwrap_or_else(|_| EnvFilter::new("symboldb=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
