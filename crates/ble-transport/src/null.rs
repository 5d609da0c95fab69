//! Transport used when no BLE stack is present

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;
use crate::filter::DeviceFilter;
use crate::transport::{Connection, Transport};

/// Stand-in capability for builds or platforms without Bluetooth LE
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl NullTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for NullTransport {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn connect(
        &self,
        _filter: &DeviceFilter,
        _scan_window: Duration,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        debug!("Null transport: no BLE capability");
        Err(TransportError::Unavailable)
    }
}
