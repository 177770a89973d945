//! Service configuration
//!
//! Loaded from a YAML file with `RECTSRV_`-prefixed environment variable
//! overrides. Every section carries defaults so a minimal file only needs
//! the rectifier endpoint.

use crate::{RectSrvError, Result};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Rectifier Modbus TCP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    /// Device host name or IP address
    pub host: String,
    /// Modbus TCP port
    pub port: u16,
    /// Modbus unit identifier
    pub unit_id: u8,
    /// Per-operation timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 502,
            unit_id: 1,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Raw register to physical unit conversion factors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub voltage_multiplier: f64,
    pub current_multiplier: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            voltage_multiplier: 10.0,
            current_multiplier: 10.0,
        }
    }
}

/// Polling cadence and failure policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed interval between scheduled poll cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Consecutive failures before a forced disconnect/reconnect
    pub max_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_failures: 3,
        }
    }
}

/// CSV journal location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Root log directory
    pub root_dir: String,
    /// Subdirectory for the dated CSV files
    pub subdir: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            root_dir: "logs".to_string(),
            subdir: "data".to_string(),
        }
    }
}

/// HTTP API bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rectifier: RectifierConfig,
    pub scaling: ScalingConfig,
    pub polling: PollingConfig,
    pub journal: JournalConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a YAML file merged with environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("RECTSRV_").split("__"));
        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| RectSrvError::config(format!("failed to load configuration: {e}")))?;
        Ok(config)
    }

    /// Validate parameter ranges before the service starts
    pub fn validate(&self) -> Result<()> {
        if self.rectifier.host.trim().is_empty() {
            return Err(RectSrvError::config("rectifier.host cannot be empty"));
        }
        if self.rectifier.port == 0 {
            return Err(RectSrvError::config("rectifier.port cannot be zero"));
        }
        if self.rectifier.timeout.is_zero() {
            return Err(RectSrvError::config(
                "rectifier.timeout must be greater than zero",
            ));
        }
        if !(self.scaling.voltage_multiplier.is_finite() && self.scaling.voltage_multiplier > 0.0) {
            return Err(RectSrvError::config(
                "scaling.voltage_multiplier must be a positive number",
            ));
        }
        if !(self.scaling.current_multiplier.is_finite() && self.scaling.current_multiplier > 0.0) {
            return Err(RectSrvError::config(
                "scaling.current_multiplier must be a positive number",
            ));
        }
        if self.polling.interval.is_zero() {
            return Err(RectSrvError::config(
                "polling.interval must be greater than zero",
            ));
        }
        if self.polling.max_failures == 0 {
            return Err(RectSrvError::config(
                "polling.max_failures must be at least 1",
            ));
        }
        if self.journal.root_dir.trim().is_empty() {
            return Err(RectSrvError::config("journal.root_dir cannot be empty"));
        }
        if self.api.port == 0 {
            return Err(RectSrvError::config("api.port cannot be zero"));
        }
        Ok(())
    }
}
