//! Simulation Fallback
//!
//! Stands in for the adapter chain when no BLE capability is present,
//! no adapter is found, or the caller asked for a demo scan.

mod simulator;

pub use simulator::{SimulatedScanner, SimulationConfig};
