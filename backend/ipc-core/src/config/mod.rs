//! Persistent settings for the IPC layer and its host bridge.

use crate::error::config::ConfigError;
use crate::ipc::RetryPolicy;
use crate::{BRIDGE_BIND_HOST, BRIDGE_DEFAULT_PORT};

use common::ErrorLocation;

use std::net::IpAddr;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "ipc.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsConfig {
    /// Deadline for outbound calls that do not pass their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Total delivery attempts, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// `0` asks the OS for a free port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_host: default_bind_host(),
        }
    }
}

impl BridgeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.address())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub calls: CallsConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            calls: CallsConfig::default(),
            transport: TransportConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retry_interval_ms() -> u64 {
    1_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_port() -> u16 {
    BRIDGE_DEFAULT_PORT
}
fn default_bind_host() -> String {
    BRIDGE_BIND_HOST.to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl IpcConfig {
    /// Load config from `{config_dir}/ipc.json`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(IpcConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "IPC config not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        let config: IpcConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            })?;

        config.validate()?;

        info!("IPC config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/ipc.json` via temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// the write or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("IPC config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(invalid(
                "version",
                format!("{} (expected 1-{})", self.version, CONFIG_VERSION),
            ));
        }

        if self.calls.default_timeout_ms == 0 {
            return Err(invalid("calls.default_timeout_ms", "must be positive"));
        }

        if self.transport.retry_interval_ms == 0 {
            return Err(invalid("transport.retry_interval_ms", "must be positive"));
        }

        if self.transport.max_attempts == 0 {
            return Err(invalid("transport.max_attempts", "must be at least 1"));
        }

        if !is_loopback_host(&self.bridge.bind_host) {
            return Err(invalid(
                "bridge.bind_host",
                format!("{} is not a loopback address", self.bridge.bind_host),
            ));
        }

        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.calls.default_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.transport.retry_interval_ms),
            max_attempts: self.transport.max_attempts,
        }
    }
}

#[track_caller]
fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        field,
        reason: reason.into(),
    }
}

fn is_loopback_host(host: &str) -> bool {
    host == "localhost" || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}
