//! Scan Error Types

use ble_transport::TransportError;
use obd_protocol::ObdError;
use thiserror::Error;

/// User-actionable scan failures
#[derive(Debug, Error)]
pub enum ScanError {
    /// No BLE capability and simulation was not possible
    #[error("Bluetooth LE is not available on this system")]
    TransportUnavailable,

    /// Scan window elapsed without a matching adapter
    #[error("No OBD adapter found")]
    AdapterNotFound,

    #[error("Bluetooth permission denied")]
    PermissionDenied,

    /// Connecting or locating the serial characteristic failed
    #[error("Could not connect to adapter: {0}")]
    ConnectFailed(String),

    #[error("Write to adapter failed: {0}")]
    WriteFailed(String),

    /// Connection dropped mid-scan
    #[error("Connection to adapter lost")]
    ConnectionLost,

    /// A non-probe init command was answered with ERROR
    #[error("Cannot communicate with vehicle ECU ({command} answered {response:?})")]
    InitializationFailed { command: String, response: String },

    /// Another scan holds the adapter
    #[error("A scan is already in progress")]
    Busy,

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Driver misuse that should not reach users
    #[error("Internal protocol error: {0}")]
    Protocol(String),
}

impl ScanError {
    /// What the user can do about it
    pub fn hint(&self) -> &'static str {
        match self {
            ScanError::TransportUnavailable => "Enable Bluetooth on this machine and retry",
            ScanError::AdapterNotFound => {
                "Plug the adapter in, switch the ignition on and move closer to the adapter"
            }
            ScanError::PermissionDenied => "Grant Bluetooth permission to this application",
            ScanError::ConnectFailed(_) => "Move closer to the adapter and retry the scan",
            ScanError::WriteFailed(_) | ScanError::ConnectionLost => "Reconnect the adapter",
            ScanError::InitializationFailed { .. } => {
                "Check the ignition is on and the adapter is seated in the OBD port"
            }
            ScanError::Busy => "Wait for the current scan to finish",
            ScanError::Config(_) => "Fix the configuration file or OBD_SCAN_* environment variables",
            ScanError::Protocol(_) => "Retry the scan",
        }
    }

    /// Whether simply scanning again may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScanError::TransportUnavailable
                | ScanError::PermissionDenied
                | ScanError::Config(_)
                | ScanError::Protocol(_)
        )
    }
}

impl From<TransportError> for ScanError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable => ScanError::TransportUnavailable,
            TransportError::DeviceNotFound => ScanError::AdapterNotFound,
            TransportError::PermissionDenied => ScanError::PermissionDenied,
            TransportError::ConnectFailed(msg) => ScanError::ConnectFailed(msg),
            TransportError::CharacteristicMissing => {
                ScanError::ConnectFailed(TransportError::CharacteristicMissing.to_string())
            }
            TransportError::WriteFailed(msg) => ScanError::WriteFailed(msg),
            TransportError::Closed => ScanError::ConnectionLost,
        }
    }
}

impl From<ObdError> for ScanError {
    fn from(err: ObdError) -> Self {
        match err {
            ObdError::Transport(inner) => inner.into(),
            ObdError::TransportClosed => ScanError::ConnectionLost,
            ObdError::InitializationFailed { command, response } => {
                ScanError::InitializationFailed { command, response }
            }
            ObdError::CommandInFlight => ScanError::Busy,
            other => ScanError::Protocol(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for ScanError {
    fn from(err: config::ConfigError) -> Self {
        ScanError::Config(err.to_string())
    }
}
