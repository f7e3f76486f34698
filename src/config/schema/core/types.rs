use super::super::{AccessConfig, GatewayConfig, StorageConfig};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory - computed from home or the config location, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Shared secret producers send in `X-API-KEY`. Empty disables pushes.
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let reportgate_dir = home.join(".reportgate");

        Self {
            data_dir: reportgate_dir.clone(),
            config_path: reportgate_dir.join("config.toml"),
            api_key: String::new(),
            access: AccessConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.access.validate().map_err(ConfigError::Validation)?;
        self.storage.validate().map_err(ConfigError::Validation)?;
        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "gateway.request_timeout_secs must be a positive integer".into(),
            ));
        }
        Ok(())
    }

    /// Whether producers can push at all.
    pub fn push_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
