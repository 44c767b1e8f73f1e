//! Structured logging initialization.
//!
//! Thin wrapper over `tracing-subscriber` driven by [`LoggingConfig`]. Call
//! once at startup; a second call is an error because the global subscriber
//! is already installed.

use crate::config::LoggingConfig;
use crate::error::{BrokerError, Result};

/// Install the global tracing subscriber according to `config`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| BrokerError::ConfigError(format!("Failed to initialize logging: {e}")))
}
