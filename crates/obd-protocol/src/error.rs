//! OBD-II Error Types

use ble_transport::TransportError;
use thiserror::Error;

/// Errors that can occur during OBD-II communication
#[derive(Debug, Error)]
pub enum ObdError {
    /// Transport-level failure (connect, write, permissions)
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// The connection closed while a command was outstanding
    #[error("Transport closed while awaiting adapter response")]
    TransportClosed,

    /// A non-probe init command was answered with ERROR
    #[error("Adapter initialization failed at {command}: {response}")]
    InitializationFailed { command: String, response: String },

    /// A second command was sent while one is still awaiting its response
    #[error("A command is already awaiting a response on this connection")]
    CommandInFlight,

    /// Command text is not a valid ELM327 command
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Text is not a 5-character trouble code
    #[error("Invalid trouble code: {0}")]
    InvalidTroubleCode(String),

    /// Diagnostic read attempted before the init sequence completed
    #[error("Adapter has not been initialized")]
    NotInitialized,
}

impl From<TransportError> for ObdError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => ObdError::TransportClosed,
            other => ObdError::Transport(other),
        }
    }
}
