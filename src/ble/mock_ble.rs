//! Mock BLE transport for tests.
//! Records every call so tests can assert on the traffic between the relay and the device.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use crate::ble::ble_trait::{
    BleAdapter, BleError, BlePeripheral, GattCharacteristic, NotificationReceiver,
    PeripheralInfo, PeripheralStream,
};
use crate::ble::nus::{NUS_INPUT_CHAR_UUID, NUS_OUTPUT_CHAR_UUID, NUS_SERVICE_UUID};

/// Adapter with a fixed set of known peripherals and a scripted scan
pub struct MockAdapter {
    known: Vec<Arc<MockPeripheral>>,
    scan_results: Vec<Arc<MockPeripheral>>,
    /// Keep the scan stream open after the scripted results, like a real radio
    endless_scan: bool,
    pub scan_starts: AtomicUsize,
    pub scan_stops: AtomicUsize,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            known: Vec::new(),
            scan_results: Vec::new(),
            endless_scan: false,
            scan_starts: AtomicUsize::new(0),
            scan_stops: AtomicUsize::new(0),
        }
    }

    pub fn with_known(mut self, peripheral: Arc<MockPeripheral>) -> Self {
        self.known.push(peripheral);
        self
    }

    pub fn with_scan_result(mut self, peripheral: Arc<MockPeripheral>) -> Self {
        self.scan_results.push(peripheral);
        self
    }

    pub fn endless_scan(mut self) -> Self {
        self.endless_scan = true;
        self
    }

    pub fn scan_starts(&self) -> usize {
        self.scan_starts.load(Ordering::SeqCst)
    }

    pub fn scan_stops(&self) -> usize {
        self.scan_stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleAdapter for MockAdapter {
    async fn describe(&self) -> Result<String, BleError> {
        Ok("mock adapter".to_string())
    }

    async fn known_peripherals(&self) -> Result<Vec<Arc<dyn BlePeripheral>>, BleError> {
        Ok(self
            .known
            .iter()
            .map(|p| p.clone() as Arc<dyn BlePeripheral>)
            .collect())
    }

    async fn start_scan(&self) -> Result<PeripheralStream, BleError> {
        self.scan_starts.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Arc<dyn BlePeripheral>> = self
            .scan_results
            .iter()
            .map(|p| p.clone() as Arc<dyn BlePeripheral>)
            .collect();
        let scripted = stream::iter(found);
        if self.endless_scan {
            Ok(Box::pin(scripted.chain(stream::pending())))
        } else {
            Ok(Box::pin(scripted))
        }
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.scan_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Peripheral whose connection and GATT state is driven by the test
pub struct MockPeripheral {
    info: PeripheralInfo,
    connected: AtomicBool,
    resolved: AtomicBool,
    has_characteristics: bool,
    info_fails: bool,
    link: watch::Sender<bool>,
    pub connect_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub input: Arc<MockCharacteristic>,
    pub output: Arc<MockCharacteristic>,
}

impl MockPeripheral {
    /// Peripheral advertising the NUS service
    pub fn nus(name: &str, address: &str) -> Self {
        Self::with_services(name, address, vec![NUS_SERVICE_UUID])
    }

    pub fn with_services(name: &str, address: &str, services: Vec<Uuid>) -> Self {
        let (link, _) = watch::channel(false);
        Self {
            info: PeripheralInfo {
                name: Some(name.to_string()),
                address: address.to_string(),
                services,
            },
            connected: AtomicBool::new(false),
            resolved: AtomicBool::new(false),
            has_characteristics: true,
            info_fails: false,
            link,
            connect_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            input: Arc::new(MockCharacteristic::new(NUS_INPUT_CHAR_UUID)),
            output: Arc::new(MockCharacteristic::new(NUS_OUTPUT_CHAR_UUID)),
        }
    }

    pub fn already_connected(self) -> Self {
        self.connected.store(true, Ordering::SeqCst);
        self.link.send_replace(true);
        self
    }

    pub fn already_resolved(self) -> Self {
        self.resolved.store(true, Ordering::SeqCst);
        self
    }

    /// Advertises the service but exposes no NUS characteristics once resolved
    pub fn without_characteristics(mut self) -> Self {
        self.has_characteristics = false;
        self
    }

    /// Reading advertisement data fails, like a peripheral that vanished
    pub fn failing_info(mut self) -> Self {
        self.info_fails = true;
        self
    }

    /// Simulate the link dropping
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.link.send_replace(false);
        self.input.fail_writes_not_connected();
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlePeripheral for MockPeripheral {
    fn id(&self) -> String {
        self.info.address.clone()
    }

    async fn info(&self) -> Result<PeripheralInfo, BleError> {
        if self.info_fails {
            return Err(BleError::Transport("properties unavailable".to_string()));
        }
        Ok(self.info.clone())
    }

    async fn is_connected(&self) -> Result<bool, BleError> {
        Ok(self.connected.load(Ordering::SeqCst))
    }

    async fn connect(&self) -> Result<(), BleError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        self.link.send_replace(true);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn services_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    async fn resolve_services(&self) -> Result<(), BleError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.resolved.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn characteristic(&self, service: Uuid, uuid: Uuid) -> Option<Arc<dyn GattCharacteristic>> {
        if !self.services_resolved() || !self.has_characteristics || service != NUS_SERVICE_UUID {
            return None;
        }
        if uuid == NUS_INPUT_CHAR_UUID {
            Some(self.input.clone() as Arc<dyn GattCharacteristic>)
        } else if uuid == NUS_OUTPUT_CHAR_UUID {
            Some(self.output.clone() as Arc<dyn GattCharacteristic>)
        } else {
            None
        }
    }

    async fn wait_disconnected(&self) -> Result<(), BleError> {
        let mut link = self.link.subscribe();
        link.wait_for(|up| !*up)
            .await
            .map_err(|e| BleError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Characteristic recording writes and forwarding injected notifications
pub struct MockCharacteristic {
    uuid: Uuid,
    writes: Mutex<Vec<Vec<u8>>>,
    fail_not_connected: AtomicBool,
    subscriber: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
}

impl MockCharacteristic {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            writes: Mutex::new(Vec::new()),
            fail_not_connected: AtomicBool::new(false),
            subscriber: Mutex::new(None),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    /// Every following write fails as if the link was gone
    pub fn fail_writes_not_connected(&self) {
        self.fail_not_connected.store(true, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.lock().unwrap().is_some()
    }

    /// Deliver a notification to the current subscriber, as the radio would
    pub fn notify(&self, payload: &[u8]) -> bool {
        match self.subscriber.lock().unwrap().as_ref() {
            Some(tx) => tx.send(payload.to_vec()).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl GattCharacteristic for MockCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn write(&self, data: &[u8]) -> Result<(), BleError> {
        if self.fail_not_connected.load(Ordering::SeqCst) {
            debug!("Mock characteristic rejecting write: not connected");
            return Err(BleError::NotConnected);
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn subscribe(&self) -> Result<NotificationReceiver, BleError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), BleError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscriber.lock().unwrap().take();
        Ok(())
    }
}
