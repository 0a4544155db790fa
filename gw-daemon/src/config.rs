//! Configuration loading for the gateway daemon.
//!
//! Configuration is loaded from a TOML file (default: `gateway.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use gw_service::GatewaySettings;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provisioning and relay settings.
    pub gateway: GatewayConfig,
    /// Input stream settings.
    pub ingest: IngestConfig,
    /// Serial mirror settings.
    pub logging: LoggingConfig,
    /// Periodic status output.
    pub status: StatusConfig,
    /// Network config (configuration pool) location.
    pub net: NetConfigPaths,
}

/// Provisioning and relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Output channel for relayed changes.
    #[serde(default = "default_output_channel")]
    pub output_channel: String,
    /// Module hosting the identity service.
    #[serde(default = "default_identity_module")]
    pub identity_module: String,
    /// Provisioning method name.
    #[serde(default = "default_provision_method")]
    pub provision_method: String,
    /// Timeout of one provisioning call in seconds (default: 60).
    #[serde(default = "default_provisioning_timeout_secs")]
    pub provisioning_timeout_secs: u64,
    /// Timeout of one relay send in seconds (default: 30).
    #[serde(default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,
}

/// Input stream settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Channel used when none is given on the command line.
    #[serde(default = "default_channel")]
    pub default_channel: String,
    /// Bound of each channel's unterminated tail in bytes (default: 64KB).
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

/// Serial mirror settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Mirror raw fragments to disk (default: true).
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Directory of the mirror files.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// File name prefix.
    #[serde(default = "default_log_prefix")]
    pub prefix: String,
}

/// Periodic status output.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// Status interval in seconds (default: 10).
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
    /// Network view file, rewritten every interval (optional).
    pub snapshot_path: Option<PathBuf>,
    /// Device fields written to the network view.
    #[serde(default = "default_delivery_fields")]
    pub delivery_fields: Vec<String>,
}

/// Network config location.
#[derive(Debug, Clone, Deserialize)]
pub struct NetConfigPaths {
    /// Path of the network config JSON.
    #[serde(default = "default_net_path")]
    pub path: PathBuf,
    /// Template copied to `path` when it does not exist (optional).
    pub template: Option<PathBuf>,
}

// Default value functions
fn default_output_channel() -> String {
    gw_service::DEFAULT_OUTPUT_CHANNEL.to_string()
}

fn default_identity_module() -> String {
    gw_service::provisioning::DEFAULT_IDENTITY_MODULE.to_string()
}

fn default_provision_method() -> String {
    gw_service::provisioning::DEFAULT_PROVISION_METHOD.to_string()
}

fn default_provisioning_timeout_secs() -> u64 {
    60
}

fn default_relay_timeout_secs() -> u64 {
    30
}

fn default_channel() -> String {
    gw_types::ChannelId::GENERIC.to_string()
}

fn default_max_pending_bytes() -> usize {
    gw_core::DEFAULT_MAX_PENDING
}

fn default_logging_enabled() -> bool {
    true
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("/app/log")
}

fn default_log_prefix() -> String {
    "iiotgw_".to_string()
}

fn default_status_interval() -> u64 {
    10
}

fn default_delivery_fields() -> Vec<String> {
    ["Name", "Id", "Type", "UID", "State", "Address", "Parent", "RSSI"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_net_path() -> PathBuf {
    PathBuf::from("/app/config/config_net.json")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            output_channel: default_output_channel(),
            identity_module: default_identity_module(),
            provision_method: default_provision_method(),
            provisioning_timeout_secs: default_provisioning_timeout_secs(),
            relay_timeout_secs: default_relay_timeout_secs(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            max_pending_bytes: default_max_pending_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: default_log_directory(),
            prefix: default_log_prefix(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_status_interval(),
            snapshot_path: None,
            delivery_fields: default_delivery_fields(),
        }
    }
}

impl Default for NetConfigPaths {
    fn default() -> Self {
        Self {
            path: default_net_path(),
            template: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Pipeline settings derived from this configuration.
    pub fn to_settings(&self) -> GatewaySettings {
        GatewaySettings {
            output_channel: self.gateway.output_channel.clone(),
            identity_module: self.gateway.identity_module.clone(),
            provision_method: self.gateway.provision_method.clone(),
            provisioning_timeout: Duration::from_secs(self.gateway.provisioning_timeout_secs),
            relay_timeout: Duration::from_secs(self.gateway.relay_timeout_secs),
            max_pending_bytes: self.ingest.max_pending_bytes,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
