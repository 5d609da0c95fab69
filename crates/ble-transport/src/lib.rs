//! BLE Transport Layer
//!
//! Presents the GATT characteristic used by ELM327 BLE adapters (one
//! write, one notify) as a byte-oriented duplex channel. This crate has
//! no knowledge of the ELM327 command set.

mod error;
mod filter;
mod hub;
pub mod mock;
mod null;
mod state;
mod transport;

#[cfg(feature = "bluez")]
mod bluez;

pub use error::TransportError;
pub use filter::{DeviceFilter, DEFAULT_NAME_FILTERS};
pub use hub::{FragmentHub, Subscription};
pub use mock::{MockConnection, MockTransport};
pub use null::NullTransport;
pub use state::AdapterState;
pub use transport::{Connection, Transport};

#[cfg(feature = "bluez")]
pub use bluez::BluezTransport;

/// GATT identifiers of the Serial Port Profile used by common ELM327 BLE adapters
pub mod gatt {
    use uuid::Uuid;

    /// Serial service UUID (0000FFE0-0000-1000-8000-00805F9B34FB)
    pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

    /// Write + notify characteristic UUID (0000FFE1-0000-1000-8000-00805F9B34FB)
    pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);
}
