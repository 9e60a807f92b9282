//! Error types for configuration module
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlDeError;
use tracing_subscriber::filter::ParseError as FilterParseError;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to open or read configuration file
    #[error("Failed to open configuration file: {0}")]
    FileOpenError(#[from] IoError),

    /// Failed to parse configuration file
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] TomlDeError),

    /// Configuration file not found
    #[error("Configuration file not found at: {0}")]
    FileNotFound(String),

    /// A value is out of range or malformed
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Log filter directive could not be parsed
    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] FilterParseError),
}
