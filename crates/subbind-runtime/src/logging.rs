#![forbid(unsafe_code)]

//! JSON log output for production hosts.
//!
//! The runtime emits `tracing` events under the `subbind::host`,
//! `subbind::binder` and `subbind::subject` targets. Applications that do not
//! install their own subscriber can call [`init_json_logging`] once at
//! startup.

use tracing_subscriber::EnvFilter;

use crate::config::HostConfig;
use crate::error::LoggingError;

/// Install a global JSON subscriber filtered by `directives`
/// (`EnvFilter` syntax, e.g. `"subbind=debug"`).
///
/// # Errors
///
/// - [`LoggingError::Filter`] when `directives` does not parse.
/// - [`LoggingError::AlreadyInstalled`] when a global subscriber exists.
pub fn init_json_logging(directives: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(directives).map_err(|err| LoggingError::Filter {
        directives: directives.to_string(),
        reason: err.to_string(),
    })?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}

/// Install a global JSON subscriber using `config.log_filter`.
///
/// # Errors
///
/// See [`init_json_logging`].
pub fn init_from_config(config: &HostConfig) -> Result<(), LoggingError> {
    init_json_logging(&config.log_filter)
}
