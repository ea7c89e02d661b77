//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub versions: VersionsConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Debugging session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default deadline for every command sent through a session.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

fn default_command_timeout_ms() -> u64 {
    10_000
}

/// HTTP and socket client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Deadline for discovery HTTP requests.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

/// Protocol version negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsConfig {
    /// Largest major-version gap accepted for a nearest match (exclusive).
    #[serde(default = "default_fudge_factor")]
    pub fudge_factor: u32,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            fudge_factor: default_fudge_factor(),
        }
    }
}

fn default_fudge_factor() -> u32 {
    5
}

/// Browser description used to locate the debugging endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Browser name as reported in capabilities (`chrome`, `msedge`, `firefox`).
    #[serde(default)]
    pub browser_name: Option<String>,

    /// `host:port` the browser listens on for remote debugging.
    #[serde(default)]
    pub debugger_address: Option<String>,

    /// Explicit debugging socket URL; skips HTTP discovery.
    #[serde(default)]
    pub cdp_endpoint: Option<String>,

    /// Browser version string used for schema negotiation.
    #[serde(default)]
    pub browser_version: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
