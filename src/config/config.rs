//! Configuration data structures for nus_terminal
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Top level configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Target device selection
    pub device: DeviceConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Device selection and session behaviour
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Advertised device name to connect to
    pub name: Option<String>,

    /// Hardware address to connect to, e.g. "C0:98:E5:49:00:01"
    pub address: Option<String>,

    /// Give up scanning after this many seconds (unbounded when absent)
    pub scan_timeout_secs: Option<u64>,

    /// Disconnect from the device when the console exits
    pub disconnect_on_exit: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            address: None,
            scan_timeout_secs: None,
            disconnect_on_exit: true,
        }
    }
}

/// Log configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: String,

    /// Write logs to rolling files in this directory instead of stderr
    pub directory: Option<PathBuf>,

    /// Log file name prefix
    pub file_name_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            directory: None,
            file_name_prefix: "nus_terminal.log".to_string(),
        }
    }
}

/// How the target peripheral is identified.
/// Name and address are exclusive; the name wins when both are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// First peripheral advertising the service
    Any,
    Name(String),
    Address(String),
}

impl DeviceConfig {
    pub fn selector(&self) -> DeviceSelector {
        match (&self.name, &self.address) {
            (Some(name), _) => DeviceSelector::Name(name.clone()),
            (None, Some(address)) => DeviceSelector::Address(address.clone()),
            (None, None) => DeviceSelector::Any,
        }
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }
}

impl BridgeConfig {
    /// Check values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(address) = &self.device.address {
            if !is_valid_address(address) {
                return Err(ConfigError::InvalidValue(format!(
                    "device.address must be six colon separated hex octets, got {:?}",
                    address
                )));
            }
        }
        if let Some(name) = &self.device.name {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "device.name must not be empty".to_string(),
                ));
            }
        }
        if self.device.scan_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "device.scan_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bluetooth address in the usual "AA:BB:CC:DD:EE:FF" notation
pub fn is_valid_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}
