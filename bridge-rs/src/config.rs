//! Configuration for bridge-rs

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{BridgeError, Result};
use crate::session::{AuthMechanism, Target};

/// Main bridge configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Management endpoint
    pub remote: RemoteConfig,
    /// Connection and execution timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Management endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Endpoint URI (e.g., "https://mail.example.com/powershell")
    pub endpoint: String,
    /// Configuration scope on the endpoint
    #[serde(default = "default_configuration_scope")]
    pub configuration_scope: String,
    /// Authentication mechanism
    #[serde(default = "default_auth_mechanism")]
    pub auth_mechanism: AuthMechanism,
}

/// Timeout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Handshake timeout in seconds
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,
    /// Per-invocation timeout in seconds
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g., "info")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_configuration_scope() -> String {
    "Microsoft.Exchange".to_string()
}

fn default_auth_mechanism() -> AuthMechanism {
    AuthMechanism::Kerberos
}

fn default_open_timeout() -> u64 {
    15
}

fn default_execution_timeout() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            open_timeout_secs: default_open_timeout(),
            execution_timeout_secs: default_execution_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl TimeoutConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        toml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create a default development configuration
    pub fn development() -> Self {
        Self {
            remote: RemoteConfig {
                endpoint: "http://127.0.0.1:8530/powershell".to_string(),
                configuration_scope: default_configuration_scope(),
                auth_mechanism: AuthMechanism::Basic,
            },
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.remote.endpoint).map_err(|e| {
            BridgeError::Config(format!("Invalid endpoint URL '{}': {}", self.remote.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(BridgeError::Config(format!(
                "Endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        if self.remote.configuration_scope.trim().is_empty() {
            return Err(BridgeError::Config("configuration_scope is empty".to_string()));
        }

        let timeouts = &self.timeouts;
        if timeouts.open_timeout_secs == 0 || timeouts.execution_timeout_secs == 0 {
            return Err(BridgeError::Config("Timeouts must be non-zero".to_string()));
        }
        if timeouts.open_timeout_secs >= timeouts.execution_timeout_secs {
            return Err(BridgeError::Config(format!(
                "open_timeout_secs ({}) must be shorter than execution_timeout_secs ({})",
                timeouts.open_timeout_secs, timeouts.execution_timeout_secs
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(BridgeError::Config(format!(
                "Unknown logging format '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// The management target described by this configuration
    pub fn target(&self) -> Result<Target> {
        let endpoint = Url::parse(&self.remote.endpoint)
            .map_err(|e| BridgeError::Config(format!("Invalid endpoint URL: {}", e)))?;
        Ok(Target::new(
            endpoint,
            self.remote.configuration_scope.clone(),
            self.remote.auth_mechanism,
        ))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::development()
    }
}
