use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::ble_trait::{
    BleAdapter, BleError, BlePeripheral, GattCharacteristic, NotificationReceiver,
    PeripheralInfo, PeripheralStream,
};

/// Writes slower than this trigger a connection check afterwards.
/// Some stacks drop the link without failing the write in flight.
const SLOW_WRITE_THRESHOLD: Duration = Duration::from_millis(500);

/// Whether a finished write needs a follow-up connection check.
/// BlueZ reports a write to a dropped link as a generic error, so every
/// failure that is not already `NotConnected` is checked too.
fn needs_link_check(outcome: &Result<(), BleError>, elapsed: Duration) -> bool {
    match outcome {
        Ok(()) => elapsed > SLOW_WRITE_THRESHOLD,
        Err(e) => !e.is_link_lost(),
    }
}

/// Final write result once the link state is known.
/// `link` is `None` when no check was made; a failed check counts as disconnected.
fn settle_write(
    outcome: Result<(), BleError>,
    link: Option<Result<bool, BleError>>,
) -> Result<(), BleError> {
    match link {
        Some(Ok(true)) | None => outcome,
        Some(Ok(false)) => Err(BleError::NotConnected),
        Some(Err(e)) => {
            debug!("Connection check after write failed: {}", e);
            Err(BleError::NotConnected)
        }
    }
}

impl From<btleplug::Error> for BleError {
    fn from(error: btleplug::Error) -> Self {
        match error {
            btleplug::Error::NotConnected => BleError::NotConnected,
            other => BleError::Transport(other.to_string()),
        }
    }
}

/// btleplug backed adapter
pub struct BtleplugAdapter {
    adapter: Adapter,
}

impl BtleplugAdapter {
    /// Open the first adapter reported by the platform
    pub async fn open_default() -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)?;
        Ok(Self { adapter })
    }

    fn wrap(&self, peripheral: Peripheral) -> Arc<dyn BlePeripheral> {
        Arc::new(BtleplugPeripheral {
            adapter: self.adapter.clone(),
            peripheral,
        })
    }
}

#[async_trait]
impl BleAdapter for BtleplugAdapter {
    async fn describe(&self) -> Result<String, BleError> {
        Ok(self.adapter.adapter_info().await?)
    }

    async fn known_peripherals(&self) -> Result<Vec<Arc<dyn BlePeripheral>>, BleError> {
        let peripherals = self.adapter.peripherals().await?;
        debug!("Adapter knows {} peripherals", peripherals.len());
        Ok(peripherals.into_iter().map(|p| self.wrap(p)).collect())
    }

    async fn start_scan(&self) -> Result<PeripheralStream, BleError> {
        // Subscribe before starting discovery so early advertisements are not lost
        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("BLE discovery started");

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    CentralEvent::ServicesAdvertisement { id, .. } => id,
                    _ => return None,
                };
                match adapter.peripheral(&id).await {
                    Ok(peripheral) => Some(Arc::new(BtleplugPeripheral {
                        adapter: adapter.clone(),
                        peripheral,
                    }) as Arc<dyn BlePeripheral>),
                    Err(e) => {
                        debug!("Discovered peripheral {:?} vanished: {}", id, e);
                        None
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.adapter.stop_scan().await?;
        info!("BLE discovery stopped");
        Ok(())
    }
}

/// btleplug backed peripheral
pub struct BtleplugPeripheral {
    adapter: Adapter,
    peripheral: Peripheral,
}

#[async_trait]
impl BlePeripheral for BtleplugPeripheral {
    fn id(&self) -> String {
        format!("{:?}", self.peripheral.id())
    }

    async fn info(&self) -> Result<PeripheralInfo, BleError> {
        let info = match self.peripheral.properties().await? {
            Some(props) => PeripheralInfo {
                name: props.local_name,
                address: props.address.to_string(),
                services: props.services,
            },
            None => PeripheralInfo {
                name: None,
                address: self.peripheral.address().to_string(),
                services: Vec::new(),
            },
        };
        Ok(info)
    }

    async fn is_connected(&self) -> Result<bool, BleError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn connect(&self) -> Result<(), BleError> {
        Ok(self.peripheral.connect().await?)
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        Ok(self.peripheral.disconnect().await?)
    }

    fn services_resolved(&self) -> bool {
        !self.peripheral.services().is_empty()
    }

    async fn resolve_services(&self) -> Result<(), BleError> {
        Ok(self.peripheral.discover_services().await?)
    }

    fn characteristic(&self, service: Uuid, uuid: Uuid) -> Option<Arc<dyn GattCharacteristic>> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == uuid)
            .map(|characteristic| {
                Arc::new(BtleplugCharacteristic {
                    peripheral: self.peripheral.clone(),
                    characteristic,
                }) as Arc<dyn GattCharacteristic>
            })
    }

    async fn wait_disconnected(&self) -> Result<(), BleError> {
        let id = self.peripheral.id();
        let mut events = self.adapter.events().await?;
        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDisconnected(gone) = event {
                if gone == id {
                    info!("Adapter reported {:?} disconnected", id);
                    return Ok(());
                }
            }
        }
        Err(BleError::Transport("adapter event stream ended".to_string()))
    }
}

/// btleplug backed characteristic
pub struct BtleplugCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl BtleplugCharacteristic {
    fn write_type(&self) -> WriteType {
        if self.characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        }
    }
}

#[async_trait]
impl GattCharacteristic for BtleplugCharacteristic {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    async fn write(&self, data: &[u8]) -> Result<(), BleError> {
        let started = Instant::now();
        let outcome = self
            .peripheral
            .write(&self.characteristic, data, self.write_type())
            .await
            .map_err(BleError::from);
        let elapsed = started.elapsed();

        let link = if needs_link_check(&outcome, elapsed) {
            match &outcome {
                Ok(()) => warn!("Write of {} bytes took {:?}, checking link", data.len(), elapsed),
                Err(e) => debug!("Write failed ({}), checking link", e),
            }
            Some(self.peripheral.is_connected().await.map_err(BleError::from))
        } else {
            None
        };
        settle_write(outcome, link)
    }

    async fn subscribe(&self) -> Result<NotificationReceiver, BleError> {
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&self.characteristic).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let uuid = self.characteristic.uuid;
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).is_err() {
                    break;
                }
            }
            debug!("Notification pump for {} finished", uuid);
        });
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), BleError> {
        Ok(self.peripheral.unsubscribe(&self.characteristic).await?)
    }
}
