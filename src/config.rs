//! # Configuration Management
//!
//! Centralized configuration for the broker.
//!
//! This module provides structured configuration for the listener, the
//! authentication and session policies, and the transport limits, together
//! with validation of common misconfigurations.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()` (prefix `REMOTE_BROKER_`)
//! - Direct instantiation with defaults and `default_with_overrides()`
//!
//! ## Security Considerations
//! - Idle timeouts bound slow/stalled connections
//! - Frame size limits prevent memory exhaustion from hostile length headers
//! - Lockout settings bound online brute-force attempts per username

use crate::error::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current protocol version, carried on every message envelope.
///
/// The version is advisory: the broker logs unrecognized values but never
/// crashes on them.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Size of the frame length header in bytes (u32, big-endian).
pub const LENGTH_HEADER_SIZE: usize = 4;

/// Max allowed frame size (1 MiB). Frames declaring more are protocol
/// violations, never silently truncated.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default number of failed login attempts before a username is locked out.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Default lockout duration after too many failed attempts.
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(300);

/// Default session lifetime.
pub const SESSION_TTL: Duration = Duration::from_secs(3600);

/// Main broker configuration containing all configurable settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BrokerConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication policy
    #[serde(default)]
    pub auth: AuthConfig,

    /// Session policy
    #[serde(default)]
    pub session: SessionConfig,

    /// Transport limits and framing behavior
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| BrokerError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("REMOTE_BROKER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(max) = std::env::var("REMOTE_BROKER_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.server.max_connections = val;
            }
        }

        if let Ok(idle) = std::env::var("REMOTE_BROKER_IDLE_TIMEOUT_MS") {
            if let Ok(val) = idle.parse::<u64>() {
                config.server.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(attempts) = std::env::var("REMOTE_BROKER_MAX_LOGIN_ATTEMPTS") {
            if let Ok(val) = attempts.parse::<u32>() {
                config.auth.max_login_attempts = val;
            }
        }

        if let Ok(lockout) = std::env::var("REMOTE_BROKER_LOCKOUT_DURATION_MS") {
            if let Ok(val) = lockout.parse::<u64>() {
                config.auth.lockout_duration = Duration::from_millis(val);
            }
        }

        if let Ok(ttl) = std::env::var("REMOTE_BROKER_SESSION_TTL_MS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.session.session_ttl = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.auth.validate());
        errors.extend(self.session.validate());
        errors.extend(self.transport.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:5500")
    pub address: String,

    /// Maximum number of concurrent connections. Attempts beyond the
    /// ceiling are refused at the transport level, not queued.
    pub max_connections: usize,

    /// How long a connection may go without receiving data before it is
    /// forcibly closed.
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Per-send write deadline. A peer that cannot drain its socket within
    /// this bound is treated as a transport fault and disconnected.
    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,

    /// Timeout for graceful shutdown drain before handlers are abandoned.
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:5500"),
            max_connections: 100,
            idle_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Listen address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid listen address format: '{}' (expected format: '0.0.0.0:5500')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        if self.write_timeout.as_millis() < 100 {
            errors.push("Write timeout too short (minimum: 100ms)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Authentication policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Failed attempts before a username is locked out
    pub max_login_attempts: u32,

    /// How long a lockout lasts
    #[serde(with = "duration_serde")]
    pub lockout_duration: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: MAX_LOGIN_ATTEMPTS,
            lockout_duration: LOCKOUT_DURATION,
        }
    }
}

impl AuthConfig {
    /// Validate authentication policy
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_login_attempts == 0 {
            errors.push("Max login attempts must be greater than 0".to_string());
        }

        if self.lockout_duration.as_secs() < 1 {
            errors.push("Lockout duration too short (minimum: 1s)".to_string());
        }

        errors
    }
}

/// Session policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Session lifetime from creation
    #[serde(with = "duration_serde")]
    pub session_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: SESSION_TTL,
        }
    }
}

impl SessionConfig {
    /// Validate session policy
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.session_ttl.as_secs() < 1 {
            errors.push("Session TTL too short (minimum: 1s)".to_string());
        }

        errors
    }
}

/// Transport limits and framing behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed frame size in bytes
    pub max_frame_size: usize,

    /// Strict framing: a malformed or oversized frame fails the decode and
    /// closes the connection. Lenient (default): the frame is dropped, the
    /// stream stays live, and the violation is surfaced for accounting.
    #[serde(default)]
    pub strict_decode: bool,

    /// Protocol violations tolerated on one connection before it is closed
    pub violation_limit: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            strict_decode: false,
            violation_limit: 5,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_size
            ));
        }

        if self.violation_limit == 0 {
            errors.push("Violation limit must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

/// Helper module for Duration serialization/deserialization (milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
