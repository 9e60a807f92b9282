//! BLE transport for the NUS console.
//! The relay only talks to the capability traits in `ble_trait`;
//! `btleplug_impl` is the real radio and `mock_ble` stands in for it in tests.

mod ble_trait;
mod btleplug_impl;
#[cfg(test)]
pub mod mock_ble;
pub mod nus;

pub use ble_trait::*;
pub use btleplug_impl::BtleplugAdapter;

use std::sync::Arc;
use tracing::{error, info};

/// Acquire the default host adapter
pub async fn create_adapter() -> Result<Arc<dyn BleAdapter>, BleError> {
    match BtleplugAdapter::open_default().await {
        Ok(adapter) => {
            match adapter.describe().await {
                Ok(description) => info!("Using Bluetooth adapter: {}", description),
                Err(e) => info!("Using Bluetooth adapter (no description: {})", e),
            }
            Ok(Arc::new(adapter))
        }
        Err(e) => {
            error!("Failed to open Bluetooth adapter: {}", e);
            Err(e)
        }
    }
}
