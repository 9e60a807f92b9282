//! Configuration file loader for nus_terminal
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{BridgeConfig, ConfigError};

/// Name of the configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "nus_terminal.toml";

/// Configuration loader responsible for loading and parsing configuration files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration.
    /// An explicit path must exist; otherwise the default file is used when present
    /// and built-in defaults when it is not.
    pub fn load_config(&self, config_path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
        let config = match config_path {
            Some(path) => self.load_config_from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    info!("Using default configuration file: {:?}", path);
                    self.load_config_from_file(&path)?
                } else {
                    debug!("No configuration file found, using defaults");
                    BridgeConfig::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    fn load_config_from_file(&self, path: &Path) -> Result<BridgeConfig, ConfigError> {
        info!("Loading configuration from file: {:?}", path);

        let mut file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
            _ => ConfigError::FileOpenError(e),
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        self.parse_config(&contents)
    }

    /// Parse configuration from string content
    pub fn parse_config(&self, content: &str) -> Result<BridgeConfig, ConfigError> {
        let config = toml::from_str::<BridgeConfig>(content)?;
        debug!("Configuration parsed: {:?}", config);
        Ok(config)
    }
}

/// Default configuration path
pub fn default_config_path() -> PathBuf {
    match std::env::current_dir() {
        Ok(dir) => dir.join(DEFAULT_CONFIG_FILE),
        Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}
