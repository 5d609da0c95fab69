//! OBD-II Protocol Implementation
//!
//! This crate drives ELM327-compatible adapters over a BLE transport:
//! one-command-at-a-time request/response framing, the adapter
//! initialization handshake, and Mode 03 (stored trouble code) reads
//! with SAE J2012 decoding.

mod channel;
mod client;
mod command;
mod dtc;
mod error;
mod init;
mod protocol;
mod reader;

pub use channel::CommandChannel;
pub use client::{ClientConfig, ObdClient};
pub use command::{Command, RawResponse, DEFAULT_TIMEOUT_MS, TERMINAL_MARKERS};
pub use dtc::{decode_dtcs, DtcSystem, TroubleCode};
pub use error::ObdError;
pub use init::{AdapterInfo, InitSequencer, InitStep};
pub use protocol::ObdProtocol;
pub use reader::{DtcReader, DtcReport};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Offset added to the mode byte in a positive response
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
}
