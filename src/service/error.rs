//! Error types for the relay service layer
use thiserror::Error;

use crate::ble::BleError;

/// Relay error type. Every variant ends the run.
#[derive(Error, Debug)]
pub enum RelayError {
    /// No peripheral advertising the service matched the filters
    #[error("No matching device found")]
    NotFound,

    /// The device advertises the service but does not expose it after resolution
    #[error("Device configuration error: {0}")]
    Configuration(String),

    /// Transport failure other than a lost link
    #[error("Bluetooth error: {0}")]
    Transport(#[from] BleError),

    /// Console or terminal failure
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
