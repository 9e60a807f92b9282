//! Session manager driving one peripheral from idle to a ready NUS session
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ble::nus::{NUS_INPUT_CHAR_UUID, NUS_OUTPUT_CHAR_UUID, NUS_SERVICE_UUID};
use crate::ble::{BlePeripheral, GattCharacteristic, NotificationReceiver};
use crate::service::RelayError;
use crate::terminal::Console;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    ResolvingServices,
    /// Both characteristics found and the output subscribed
    Ready,
    /// The transport reported the link as gone
    Lost,
}

/// What the relay needs from a ready session.
/// The subscribed output characteristic stays with the manager for teardown.
pub struct ReadySession {
    /// Host to device
    pub input: Arc<dyn GattCharacteristic>,
    /// Payloads notified on the output characteristic
    pub notifications: NotificationReceiver,
}

/// Owns the connection state machine of a single peripheral
pub struct SessionManager {
    peripheral: Arc<dyn BlePeripheral>,
    console: Console,
    state: Arc<watch::Sender<SessionState>>,
    subscribed: Option<Arc<dyn GattCharacteristic>>,
    link_monitor: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn new(peripheral: Arc<dyn BlePeripheral>, console: Console) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            peripheral,
            console,
            state: Arc::new(state),
            subscribed: None,
            link_monitor: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state changes, including an asynchronous `Lost`
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Lost is terminal; later transitions are ignored
    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == SessionState::Lost || *current == next {
                return false;
            }
            debug!("Session state {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    /// Record a link loss detected outside the monitor, e.g. by a failed write
    pub fn mark_lost(&self) {
        self.transition(SessionState::Lost);
    }

    /// Idle -> Connecting -> Connected, or straight to Connected if already connected
    pub async fn connect(&mut self) -> Result<(), RelayError> {
        let info = self.peripheral.info().await?;
        let label = format!("{} ({})", info.display_name(), info.address);

        if self.peripheral.is_connected().await? {
            info!("Peripheral {} already connected", label);
            self.console.status(&format!("Connected to {}.", label))?;
        } else {
            self.transition(SessionState::Connecting);
            self.console.progress(&format!("Connecting to {}... ", label))?;
            if let Err(e) = self.peripheral.connect().await {
                error!("Failed to connect to {}: {}", label, e);
                self.console.status("failed")?;
                self.transition(SessionState::Idle);
                return Err(e.into());
            }
            self.console.status("ok")?;
            info!("Connected to {}", label);
        }

        self.transition(SessionState::Connected);
        self.start_link_monitor();
        Ok(())
    }

    /// Connected -> ResolvingServices, skipped when the GATT database is already known
    pub async fn resolve_services(&mut self) -> Result<(), RelayError> {
        if self.peripheral.services_resolved() {
            debug!("Services already resolved");
            return Ok(());
        }
        self.transition(SessionState::ResolvingServices);
        self.console.status("Resolving services...")?;
        self.peripheral.resolve_services().await?;
        info!("Services resolved");
        Ok(())
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, RelayError> {
        self.peripheral
            .characteristic(NUS_SERVICE_UUID, uuid)
            .ok_or_else(|| {
                RelayError::Configuration(format!(
                    "service {} does not expose characteristic {}",
                    NUS_SERVICE_UUID, uuid
                ))
            })
    }

    /// Drive the peripheral to Ready and subscribe to its output
    pub async fn establish(&mut self) -> Result<ReadySession, RelayError> {
        self.connect().await?;
        self.resolve_services().await?;

        let input = self.characteristic(NUS_INPUT_CHAR_UUID)?;
        let output = self.characteristic(NUS_OUTPUT_CHAR_UUID)?;

        let notifications = output.subscribe().await?;
        self.subscribed = Some(output);
        self.transition(SessionState::Ready);
        info!("NUS session ready");

        Ok(ReadySession {
            input,
            notifications,
        })
    }

    fn start_link_monitor(&mut self) {
        if self.link_monitor.is_some() {
            return;
        }
        let peripheral = self.peripheral.clone();
        let state = self.state.clone();
        self.link_monitor = Some(tokio::spawn(async move {
            match peripheral.wait_disconnected().await {
                Ok(()) => {
                    warn!("Link to {} lost", peripheral.id());
                    state.send_replace(SessionState::Lost);
                }
                Err(e) => debug!("Link monitor stopped: {}", e),
            }
        }));
    }

    /// Release the subscription and optionally the connection.
    /// Nothing is sent to a peripheral whose link is already lost.
    pub async fn teardown(&mut self, disconnect: bool) {
        if let Some(monitor) = self.link_monitor.take() {
            monitor.abort();
        }
        let lost = self.state() == SessionState::Lost;

        if let Some(output) = self.subscribed.take() {
            if !lost {
                if let Err(e) = output.unsubscribe().await {
                    warn!("Failed to unsubscribe from output: {}", e);
                }
            }
        }
        if disconnect && !lost {
            if let Err(e) = self.peripheral.disconnect().await {
                warn!("Failed to disconnect: {}", e);
            }
        }
        self.transition(SessionState::Idle);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(monitor) = self.link_monitor.take() {
            monitor.abort();
        }
    }
}
