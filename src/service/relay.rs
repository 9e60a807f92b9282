//! Relay orchestration: locate, connect, relay, unwind
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::ble::BleAdapter;
use crate::config::DeviceConfig;
use crate::service::{
    DeviceFilter, DeviceLocator, ExitReason, NotificationSink, ReadySession, RelayError,
    SessionManager, TerminalBridge,
};
use crate::terminal::{Console, InputSource, TerminalMode};

/// Per-run settings
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOptions {
    pub filter: DeviceFilter,
    pub scan_timeout: Option<Duration>,
    pub disconnect_on_exit: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            filter: DeviceFilter::default(),
            scan_timeout: None,
            disconnect_on_exit: true,
        }
    }
}

impl From<&DeviceConfig> for RelayOptions {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            filter: device.selector().into(),
            scan_timeout: device.scan_timeout(),
            disconnect_on_exit: device.disconnect_on_exit,
        }
    }
}

/// Run one console session against the adapter.
/// Every stage failure ends the run; nothing is retried.
pub async fn run_session(
    adapter: Arc<dyn BleAdapter>,
    terminal: Arc<dyn TerminalMode>,
    input: &mut dyn InputSource,
    console: Console,
    options: &RelayOptions,
) -> Result<ExitReason, RelayError> {
    let locator =
        DeviceLocator::new(adapter, console.clone()).with_scan_timeout(options.scan_timeout);
    let peripheral = locator.find(&options.filter).await?;

    let mut session = SessionManager::new(peripheral, console.clone());
    let ready = match session.establish().await {
        Ok(ready) => ready,
        Err(e) => {
            warn!("Session setup failed: {}", e);
            session.teardown(options.disconnect_on_exit).await;
            return Err(e);
        }
    };
    let ReadySession {
        input: device_input,
        notifications,
    } = ready;

    let sink = NotificationSink::new(console.clone()).spawn(notifications);
    let bridge = TerminalBridge::new(terminal, console);

    let outcome = bridge
        .run(input, device_input.as_ref(), session.watch())
        .await;

    if matches!(outcome, Ok(ExitReason::LinkLost)) {
        session.mark_lost();
    }
    session.teardown(options.disconnect_on_exit).await;
    sink.finish().await;

    info!("Session ended: {:?}", outcome);
    outcome
}
