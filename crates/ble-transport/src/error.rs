//! Transport Error Types

use thiserror::Error;

/// Errors raised by a BLE transport or one of its connections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No BLE capability on this platform or build
    #[error("Bluetooth LE transport is not available")]
    Unavailable,

    /// Scan window elapsed without a device name match
    #[error("No OBD adapter found during scan")]
    DeviceNotFound,

    /// The platform refused Bluetooth access
    #[error("Bluetooth permission denied")]
    PermissionDenied,

    /// Connecting to the selected peripheral failed
    #[error("Failed to connect to adapter: {0}")]
    ConnectFailed(String),

    /// The peripheral does not expose the serial service/characteristic
    #[error("Adapter does not expose the FFE0/FFE1 serial characteristic")]
    CharacteristicMissing,

    /// Writing to the characteristic failed
    #[error("Characteristic write failed: {0}")]
    WriteFailed(String),

    /// The connection has been closed
    #[error("Transport connection closed")]
    Closed,
}
