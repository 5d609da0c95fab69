//! BlueZ-backed BLE central
//!
//! Scans with the default adapter, connects to the first peripheral whose
//! name passes the [`DeviceFilter`], then wires the FFE1 characteristic:
//! commands go out as single writes, notifications are forwarded into a
//! [`FragmentHub`] by a background task.

use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, AdapterEvent, Device, ErrorKind, Session};
use futures::{pin_mut, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::filter::DeviceFilter;
use crate::gatt::{CHARACTERISTIC_UUID, SERVICE_UUID};
use crate::hub::{FragmentHub, Subscription};
use crate::transport::{Connection, Transport};

fn map_error(err: bluer::Error) -> TransportError {
    match err.kind {
        ErrorKind::NotAuthorized | ErrorKind::NotPermitted => TransportError::PermissionDenied,
        ErrorKind::NotReady | ErrorKind::NotAvailable | ErrorKind::NotSupported => {
            TransportError::Unavailable
        }
        _ => TransportError::ConnectFailed(err.to_string()),
    }
}

/// BLE capability backed by the system BlueZ daemon
pub struct BluezTransport {
    session: Session,
}

impl BluezTransport {
    /// Open a BlueZ session. Fails with `Unavailable` when bluetoothd is absent.
    pub async fn new() -> Result<Self, TransportError> {
        let session = Session::new().await.map_err(|e| {
            warn!("BlueZ session unavailable: {}", e);
            TransportError::Unavailable
        })?;
        info!("BlueZ session created");
        Ok(Self { session })
    }

    async fn find_device(
        adapter: &Adapter,
        filter: &DeviceFilter,
        scan_window: Duration,
    ) -> Result<(Device, String), TransportError> {
        let events = adapter.discover_devices().await.map_err(map_error)?;
        pin_mut!(events);

        let search = async {
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                let Ok(device) = adapter.device(address) else {
                    continue;
                };
                match device.name().await {
                    Ok(Some(name)) if filter.matches(&name) => return Some((device, name)),
                    Ok(Some(name)) => debug!("Skipping {} ({})", name, address),
                    _ => {}
                }
            }
            None
        };

        match tokio::time::timeout(scan_window, search).await {
            Ok(Some(found)) => Ok(found),
            _ => Err(TransportError::DeviceNotFound),
        }
    }

    async fn find_characteristic(device: &Device) -> Result<Characteristic, TransportError> {
        for service in device.services().await.map_err(map_error)? {
            if service.uuid().await.map_err(map_error)? != SERVICE_UUID {
                continue;
            }
            for characteristic in service.characteristics().await.map_err(map_error)? {
                if characteristic.uuid().await.map_err(map_error)? == CHARACTERISTIC_UUID {
                    return Ok(characteristic);
                }
            }
        }
        Err(TransportError::CharacteristicMissing)
    }

    async fn open(
        device: &Device,
        name: &str,
    ) -> Result<(Characteristic, FragmentHub, JoinHandle<()>), TransportError> {
        device
            .connect()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let characteristic = Self::find_characteristic(device).await?;
        let notifications = characteristic.notify().await.map_err(map_error)?;

        let hub = FragmentHub::new();
        let forward = hub.clone();
        let device_name = name.to_string();
        let task = tokio::spawn(async move {
            pin_mut!(notifications);
            while let Some(value) = notifications.next().await {
                forward.publish(&value);
            }
            debug!("Notification stream from {} ended", device_name);
            forward.close();
        });

        Ok((characteristic, hub, task))
    }
}

#[async_trait]
impl Transport for BluezTransport {
    fn name(&self) -> &'static str {
        "bluez"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn connect(
        &self,
        filter: &DeviceFilter,
        scan_window: Duration,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let adapter = self.session.default_adapter().await.map_err(map_error)?;
        if !adapter.is_powered().await.map_err(map_error)? {
            info!("Powering on Bluetooth adapter {}", adapter.name());
            adapter.set_powered(true).await.map_err(map_error)?;
        }

        info!("Scanning for OBD adapters on {}", adapter.name());
        let (device, name) = Self::find_device(&adapter, filter, scan_window).await?;
        info!("Found adapter {} ({})", name, device.address());

        match Self::open(&device, &name).await {
            Ok((characteristic, hub, task)) => Ok(Arc::new(BluezConnection {
                name,
                device,
                characteristic,
                hub,
                connected: AtomicBool::new(true),
                notify_task: Mutex::new(Some(task)),
            })),
            Err(err) => {
                // Release the radio link before reporting the failure
                if let Err(e) = device.disconnect().await {
                    warn!("Disconnecting {} after failed setup failed: {}", name, e);
                }
                Err(err)
            }
        }
    }
}

/// Open GATT connection to an ELM327 BLE adapter
pub struct BluezConnection {
    name: String,
    device: Device,
    characteristic: Characteristic,
    hub: FragmentHub,
    connected: AtomicBool,
    notify_task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Connection for BluezConnection {
    fn device_name(&self) -> &str {
        &self.name
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.characteristic
            .write(bytes)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn subscribe(&self) -> Result<Subscription, TransportError> {
        self.hub.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.hub.is_closed()
    }

    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        self.hub.close();
        let task = self
            .notify_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        if let Err(e) = self.device.disconnect().await {
            warn!("Disconnecting {} failed: {}", self.name, e);
        }
        info!("Disconnected from {}", self.name);
    }
}

impl Drop for BluezConnection {
    fn drop(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Connection to {} dropped without disconnect", self.name);
            self.hub.close();
            // Drop the radio link too, or the adapter stays claimed
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let device = self.device.clone();
                let name = self.name.clone();
                handle.spawn(async move {
                    if let Err(e) = device.disconnect().await {
                        warn!("Disconnecting dropped connection to {} failed: {}", name, e);
                    }
                });
            }
        }
        if let Some(task) = self
            .notify_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
