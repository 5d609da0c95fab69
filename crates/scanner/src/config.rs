//! Scanner configuration
//!
//! Defaults, overridden by an optional TOML file, overridden by
//! `OBD_SCAN_*` environment variables (`__` separates nested keys, e.g.
//! `OBD_SCAN_SIMULATION__SCAN_DELAY_MS=0`).

use ble_transport::{DeviceFilter, DEFAULT_NAME_FILTERS};
use config::{Config, Environment, File, FileFormat, Source};
use dtc_classifier::{Classifier, DEFAULT_BRAKE_CRITICAL_CODES};
use fallback::SimulationConfig;
use obd_protocol::{ClientConfig, ObdProtocol};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ScanError;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "obd-scan.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "OBD_SCAN";

/// Scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Advertised-name substrings of acceptable adapters
    pub device_name_filters: Vec<String>,
    /// How long to scan for an adapter (default: 10000)
    pub scan_window_ms: u64,
    /// Per-command timeout (default: 10000)
    pub command_timeout_ms: u64,
    /// Delay after `ATZ` (default: 2000)
    pub reset_settle_ms: u64,
    /// Delay after other init commands (default: 200)
    pub command_settle_ms: u64,
    /// Bus protocol for `ATSP`
    pub protocol: ObdProtocol,
    /// Skip hardware entirely and return a simulated result
    pub demo: bool,
    /// Return a simulated result when no adapter is found
    pub simulate_if_not_found: bool,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Codes that make the brake status urgent
    pub brake_critical_codes: Vec<String>,
    pub simulation: SimulationConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            device_name_filters: DEFAULT_NAME_FILTERS.iter().map(|s| s.to_string()).collect(),
            scan_window_ms: 10_000,
            command_timeout_ms: 10_000,
            reset_settle_ms: 2000,
            command_settle_ms: 200,
            protocol: ObdProtocol::Auto,
            demo: false,
            simulate_if_not_found: true,
            log_json: false,
            brake_critical_codes: DEFAULT_BRAKE_CRITICAL_CODES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load from `path` (optional) layered under `OBD_SCAN_*` variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let file = File::from(path.as_ref()).format(FileFormat::Toml).required(false);
        Self::layered(file, environment())
    }

    /// Parse TOML text layered under `OBD_SCAN_*` variables
    pub fn from_toml(text: &str) -> Result<Self, ScanError> {
        Self::layered(File::from_str(text, FileFormat::Toml), environment())
    }

    fn layered<S>(file: S, env: Environment) -> Result<Self, ScanError>
    where
        S: Source + Send + Sync + 'static,
    {
        let config: Self = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no scan could run with
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.device_filter().patterns().is_empty() {
            return Err(ScanError::Config(
                "device_name_filters must contain at least one name".into(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(ScanError::Config("command_timeout_ms must be positive".into()));
        }
        self.classifier()?;
        Ok(())
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter::new(&self.device_name_filters)
    }

    pub fn classifier(&self) -> Result<Classifier, ScanError> {
        Classifier::new(&self.brake_critical_codes)
            .map_err(|e| ScanError::Config(format!("brake_critical_codes: {}", e)))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            protocol: self.protocol,
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            reset_settle: Duration::from_millis(self.reset_settle_ms),
            command_settle: Duration::from_millis(self.command_settle_ms),
        }
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("device_name_filters")
        .with_list_parse_key("brake_critical_codes")
}
