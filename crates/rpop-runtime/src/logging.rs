#![forbid(unsafe_code)]

//! Logging setup helpers.
//!
//! The library only emits `tracing` records; installing a subscriber is the
//! host's job. Hosts without their own subscriber can enable the
//! `tracing-json` feature and call [`init_json_logging`].

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "RPOP_LOG";

/// Default filter when [`LOG_FILTER_ENV`] is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a global JSON subscriber filtered by `RPOP_LOG`.
///
/// Fails if a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
}
