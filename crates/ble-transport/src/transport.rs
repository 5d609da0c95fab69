//! Transport capability traits

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::filter::DeviceFilter;
use crate::hub::Subscription;

/// A platform BLE capability able to find and open adapter connections.
///
/// Selected once at startup. The rest of the driver is written against
/// this trait and does not know which implementation is active.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Whether a BLE stack is present at all
    fn is_available(&self) -> bool;

    /// Scan for up to `scan_window` and connect to the first peripheral
    /// whose advertised name passes `filter`
    async fn connect(
        &self,
        filter: &DeviceFilter,
        scan_window: Duration,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}

/// An open duplex channel to one adapter
#[async_trait]
pub trait Connection: Send + Sync {
    /// Advertised name of the connected peripheral
    fn device_name(&self) -> &str;

    /// Write one command as a single characteristic write
    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Register a listener for notification fragments
    fn subscribe(&self) -> Result<Subscription, TransportError>;

    /// Whether the connection is still open
    fn is_connected(&self) -> bool;

    /// Close the connection and release the platform resource.
    ///
    /// Idempotent. Pending subscribers are woken with `None`.
    async fn disconnect(&self);
}
