//! Locates the peripheral to talk to.
//! Known peripherals are checked first; discovery only runs when none matches.
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::ble::nus::NUS_SERVICE_UUID;
use crate::ble::{BleAdapter, BleError, BlePeripheral, PeripheralInfo, PeripheralStream};
use crate::config::DeviceSelector;
use crate::service::RelayError;
use crate::terminal::Console;

/// Optional identity filters. A candidate must satisfy every filter that is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFilter {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl DeviceFilter {
    pub fn new(name: Option<String>, address: Option<String>) -> Self {
        Self { name, address }
    }

    /// Service and identity predicate shared by lookup and scan
    pub fn matches(&self, info: &PeripheralInfo) -> bool {
        if !info.advertises(&NUS_SERVICE_UUID) {
            return false;
        }
        if let Some(name) = &self.name {
            if info.name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(address) = &self.address {
            if !info.address.eq_ignore_ascii_case(address) {
                return false;
            }
        }
        true
    }
}

impl From<DeviceSelector> for DeviceFilter {
    fn from(selector: DeviceSelector) -> Self {
        match selector {
            DeviceSelector::Any => DeviceFilter::default(),
            DeviceSelector::Name(name) => DeviceFilter::new(Some(name), None),
            DeviceSelector::Address(address) => DeviceFilter::new(None, Some(address)),
        }
    }
}

/// An open discovery session.
/// `close` stops discovery; a session dropped without closing stops it in the background.
pub struct ScanSession {
    adapter: Arc<dyn BleAdapter>,
    peripherals: PeripheralStream,
    open: bool,
}

impl ScanSession {
    pub async fn open(adapter: Arc<dyn BleAdapter>) -> Result<Self, BleError> {
        let peripherals = adapter.start_scan().await?;
        Ok(Self {
            adapter,
            peripherals,
            open: true,
        })
    }

    /// Next discovered peripheral, `None` when the adapter ends discovery
    pub async fn next(&mut self) -> Option<Arc<dyn BlePeripheral>> {
        use futures_util::StreamExt;
        self.peripherals.next().await
    }

    pub async fn close(mut self) -> Result<(), BleError> {
        self.open = false;
        self.adapter.stop_scan().await
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        warn!("Scan session dropped while open, stopping discovery");
        let adapter = self.adapter.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = adapter.stop_scan().await {
                        error!("Failed to stop discovery: {}", e);
                    }
                });
            }
            Err(_) => error!("No runtime available to stop discovery"),
        }
    }
}

/// Finds a peripheral advertising the NUS service
pub struct DeviceLocator {
    adapter: Arc<dyn BleAdapter>,
    console: Console,
    scan_timeout: Option<Duration>,
}

impl DeviceLocator {
    pub fn new(adapter: Arc<dyn BleAdapter>, console: Console) -> Self {
        Self {
            adapter,
            console,
            scan_timeout: None,
        }
    }

    pub fn with_scan_timeout(mut self, scan_timeout: Option<Duration>) -> Self {
        self.scan_timeout = scan_timeout;
        self
    }

    /// Lookup among known peripherals, then scan
    pub async fn find(&self, filter: &DeviceFilter) -> Result<Arc<dyn BlePeripheral>, RelayError> {
        if let Some(peripheral) = self.lookup(filter).await? {
            return Ok(peripheral);
        }

        self.console.status("Cannot find device, starting discovery...")?;
        let mut scan = ScanSession::open(self.adapter.clone()).await?;
        self.console.status("Waiting for device...")?;

        let found = match self.scan_timeout {
            Some(limit) => match tokio::time::timeout(limit, Self::scan(&mut scan, filter)).await {
                Ok(found) => found,
                Err(_) => {
                    info!("Scan timed out after {:?}", limit);
                    None
                }
            },
            None => Self::scan(&mut scan, filter).await,
        };
        scan.close().await?;

        found.ok_or(RelayError::NotFound)
    }

    /// First known peripheral passing the filter, in enumeration order
    pub async fn lookup(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<Arc<dyn BlePeripheral>>, RelayError> {
        for peripheral in self.adapter.known_peripherals().await? {
            match peripheral.info().await {
                Ok(info) if filter.matches(&info) => {
                    info!("Found known device {} ({})", info.display_name(), info.address);
                    return Ok(Some(peripheral));
                }
                Ok(info) => debug!("Skipping known peripheral {}", info.address),
                Err(e) => debug!("Could not read known peripheral {}: {}", peripheral.id(), e),
            }
        }
        Ok(None)
    }

    async fn scan(scan: &mut ScanSession, filter: &DeviceFilter) -> Option<Arc<dyn BlePeripheral>> {
        while let Some(peripheral) = scan.next().await {
            match peripheral.info().await {
                Ok(info) if filter.matches(&info) => {
                    info!("Discovered device {} ({})", info.display_name(), info.address);
                    return Some(peripheral);
                }
                Ok(info) => debug!("Ignoring discovered peripheral {}", info.address),
                Err(e) => debug!("Could not read discovered peripheral {}: {}", peripheral.id(), e),
            }
        }
        None
    }
}
