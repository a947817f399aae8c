//! `tracing` subscriber setup for hosts embedding the kernel.

use crate::config::LoggingConfig;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set and valid, else the configured
/// directive, else `info`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global fmt subscriber. Returns `false` if one was already
/// installed, which makes repeated calls harmless.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}
