use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ================ Errors and shared types ================

#[derive(Debug, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter present")]
    NoAdapter,
    #[error("Not connected")]
    NotConnected,
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BleError {
    /// True when the error means the link to the peripheral is gone
    pub fn is_link_lost(&self) -> bool {
        matches!(self, BleError::NotConnected)
    }
}

/// Identity and advertisement data of a peripheral
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeripheralInfo {
    pub name: Option<String>,
    pub address: String,
    pub services: Vec<Uuid>,
}

impl PeripheralInfo {
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.services.contains(service)
    }

    /// Name for progress messages, falls back to the address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Peripherals yielded by an active scan
pub type PeripheralStream = Pin<Box<dyn Stream<Item = Arc<dyn BlePeripheral>> + Send>>;

/// Notification payloads delivered by a subscribed characteristic
pub type NotificationReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

// ================ Capability traits ================

/// A host Bluetooth adapter
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Human readable adapter description
    async fn describe(&self) -> Result<String, BleError>;

    /// Peripherals the adapter already knows about (cached or bonded)
    async fn known_peripherals(&self) -> Result<Vec<Arc<dyn BlePeripheral>>, BleError>;

    /// Start discovery and return the discovered peripherals as a lazy stream
    async fn start_scan(&self) -> Result<PeripheralStream, BleError>;

    /// Stop discovery started by `start_scan`
    async fn stop_scan(&self) -> Result<(), BleError>;
}

/// A remote BLE device
#[async_trait]
pub trait BlePeripheral: Send + Sync {
    /// Stable transport identifier
    fn id(&self) -> String;

    async fn info(&self) -> Result<PeripheralInfo, BleError>;

    async fn is_connected(&self) -> Result<bool, BleError>;

    async fn connect(&self) -> Result<(), BleError>;

    async fn disconnect(&self) -> Result<(), BleError>;

    /// Whether the GATT database has already been discovered
    fn services_resolved(&self) -> bool;

    async fn resolve_services(&self) -> Result<(), BleError>;

    /// Look up a resolved characteristic by service and characteristic UUID
    fn characteristic(&self, service: Uuid, uuid: Uuid) -> Option<Arc<dyn GattCharacteristic>>;

    /// Resolves once the transport reports the link as dropped
    async fn wait_disconnected(&self) -> Result<(), BleError>;
}

/// A resolved GATT characteristic
#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn write(&self, data: &[u8]) -> Result<(), BleError>;

    /// Enable notifications; payloads arrive on the returned channel
    async fn subscribe(&self) -> Result<NotificationReceiver, BleError>;

    async fn unsubscribe(&self) -> Result<(), BleError>;
}
