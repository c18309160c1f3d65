use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cycle::CyclePeriod,
    registers::{I2C_ADDR_SB_CLOSED, I2C_ADDR_SB_OPEN},
};

/// WPA2 passphrases shorter than this are refused by the access point.
pub const MIN_AP_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported cycle period `{0}` (expected 3, 100 or 300 seconds)")]
    UnknownCyclePeriod(String),
    #[error("unsupported i2c address {0:#04x}")]
    UnknownI2cAddress(u8),
    #[error("wifi ssid cannot be empty")]
    EmptySsid,
    #[error("access point password must be at least 8 characters")]
    ShortApPassword,
    #[error("http port must be between 1 and 65535")]
    InvalidHttpPort,
    #[error("unknown diagnostics mode `{0}` (expected off, labeled or columns)")]
    UnknownDiagnosticsMode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsMode {
    Off,
    /// One labeled line per quantity, with units.
    #[default]
    Labeled,
    /// One row of space-separated numbers per cycle.
    Columns,
}

impl DiagnosticsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Labeled => "labeled",
            Self::Columns => "columns",
        }
    }
}

impl core::str::FromStr for DiagnosticsMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "off" | "false" | "0" => Ok(Self::Off),
            "labeled" | "on" | "true" | "1" => Ok(Self::Labeled),
            "columns" => Ok(Self::Columns),
            _ => Err(ConfigError::UnknownDiagnosticsMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SenseConfig {
    #[serde(rename = "i2cAddress")]
    pub i2c_address: u8,
    #[serde(rename = "cyclePeriod")]
    pub cycle_period: CyclePeriod,
    #[serde(rename = "particleSensor")]
    pub particle_sensor: bool,
    pub diagnostics: DiagnosticsMode,
    /// Drop a client that stays silent this long. `None` waits forever.
    #[serde(rename = "clientTimeoutMs")]
    pub client_timeout_ms: Option<u64>,
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self {
            i2c_address: I2C_ADDR_SB_OPEN,
            cycle_period: CyclePeriod::Seconds3,
            particle_sensor: true,
            diagnostics: DiagnosticsMode::Labeled,
            client_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Create a new network with a fixed address.
    #[default]
    Host,
    /// Join an existing network and take whatever address it assigns.
    Join,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    #[serde(rename = "wifiSsid")]
    pub wifi_ssid: String,
    #[serde(rename = "wifiPass")]
    pub wifi_pass: String,
    #[serde(rename = "staticIp")]
    pub static_ip: [u8; 4],
    #[serde(rename = "httpPort")]
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Host,
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            static_ip: [192, 168, 12, 20],
            http_port: 80,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub sense: SenseConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl SenseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.i2c_address != I2C_ADDR_SB_OPEN && self.i2c_address != I2C_ADDR_SB_CLOSED {
            return Err(ConfigError::UnknownI2cAddress(self.i2c_address));
        }
        Ok(())
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.trim().is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.mode == NetworkMode::Host && self.wifi_pass.len() < MIN_AP_PASSWORD_LEN {
            return Err(ConfigError::ShortApPassword);
        }
        if self.http_port == 0 {
            return Err(ConfigError::InvalidHttpPort);
        }
        Ok(())
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sense.validate()?;
        self.network.validate()
    }
}
