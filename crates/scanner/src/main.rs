//! `obd-scan` - read and classify stored trouble codes
//!
//! ```bash
//! obd-scan [config.toml]
//! ```
//!
//! Prints the result as JSON on stdout. Logs go to stderr.

use anyhow::Result;
use ble_transport::{NullTransport, Transport};
use obd_scanner::{init_logging, DiagnosticScanner, ScannerConfig, DEFAULT_CONFIG_PATH};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match ScannerConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}\nhint: {}", err, err.hint());
            return Ok(ExitCode::from(2));
        }
    };
    init_logging(config.log_json);

    info!("=== OBD Scan v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", path);

    let transport = select_transport().await;
    let scanner = DiagnosticScanner::new(transport, config)?;

    match scanner.scan().await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("Scan failed: {}", err);
            eprintln!("error: {}\nhint: {}", err, err.hint());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(feature = "bluez")]
async fn select_transport() -> Arc<dyn Transport> {
    match ble_transport::BluezTransport::new().await {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            tracing::warn!("BlueZ unavailable ({}), continuing without BLE", err);
            Arc::new(NullTransport::new())
        }
    }
}

#[cfg(not(feature = "bluez"))]
async fn select_transport() -> Arc<dyn Transport> {
    info!("Built without BLE support");
    Arc::new(NullTransport::new())
}
