//! Process configuration, loaded once at startup from a TOML file

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{warn, Level};

use crate::dispatch::DEFAULT_TOPIC_ROOT;
use crate::mqtt::config::MqttConfig;
use crate::sysfs::SYSFS_PROGRAM;

/// Overrides the configuration file location
pub const CONFIG_ENV: &str = "MTSIO_BRIDGE_CONFIG";
const CONFIG_DIR: &str = "mtsio-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub log_level: String,
    pub mqtt: MqttConfig,
    pub tool: ToolConfig,
    pub adapter: AdapterSettings,
    pub retry: RetryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            mqtt: MqttConfig::default(),
            tool: ToolConfig::default(),
            adapter: AdapterSettings::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Device-control utility invocation
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: SYSFS_PROGRAM.to_string(),
            timeout_secs: 10,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Identity of this adapter and where its remote settings live
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AdapterSettings {
    /// Key used to query the configuration collection
    pub name: String,
    /// Used unless the collection overrides it
    pub topic_root: String,
    pub collection: Option<PathBuf>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            name: "mtsIoAdapter".to_string(),
            topic_root: DEFAULT_TOPIC_ROOT.to_string(),
            collection: None,
        }
    }
}

/// Fixed retry intervals, in seconds
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub auth_secs: u64,
    pub subscribe_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            auth_secs: 60,
            subscribe_secs: 30,
        }
    }
}

impl BridgeConfig {
    /// `$MTSIO_BRIDGE_CONFIG`, else `<config dir>/mtsio-bridge/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()).await
    }

    /// Reads and validates `path`; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = if exists {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            toml::from_str(&content)?
        } else {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            BridgeConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;

        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.program is empty".to_string()));
        }
        if self.tool.timeout_secs == 0 {
            return Err(ConfigError::Invalid("tool.timeout_secs must be > 0".to_string()));
        }
        if self.retry.auth_secs == 0 || self.retry.subscribe_secs == 0 {
            return Err(ConfigError::Invalid(
                "retry intervals must be > 0".to_string(),
            ));
        }
        if self.adapter.topic_root.is_empty() {
            return Err(ConfigError::Invalid("adapter.topic_root is empty".to_string()));
        }
        if self.mqtt.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "mqtt.channel_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
    }
}
