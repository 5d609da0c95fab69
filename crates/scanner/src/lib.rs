//! OBD-II Trouble Code Scanner
//!
//! Finds an ELM327 BLE adapter, reads stored trouble codes and returns a
//! classified `DiagnosticResult`. Substitutes a simulated no-fault result
//! when there is no Bluetooth LE capability or no adapter.

mod config;
mod error;
mod scanner;

pub use self::config::{ScannerConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use error::ScanError;
pub use scanner::DiagnosticScanner;

pub use dtc_classifier::{BrakeStatus, DiagnosticResult, EngineStatus, ResultSource};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(json: bool) {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}
