//! Diagnostic logging
//!
//! Library code logs through `tracing`; the binary installs a stderr
//! subscriber here. `RUST_LOG` overrides the level picked from the CLI flags.

use crate::output::OutputMode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn default_directive(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::Quiet => "error",
        OutputMode::Normal => "warn",
        OutputMode::Verbose => "debug",
        OutputMode::VeryVerbose => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(mode: OutputMode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(mode)));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
