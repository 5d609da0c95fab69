//! Diagnostic scan orchestration
//!
//! One scan: connect, initialize, read Mode 03, classify, disconnect.
//! The adapter connection is released on every exit path.

use ble_transport::{AdapterState, Connection, DeviceFilter, Transport, TransportError};
use dtc_classifier::{Classifier, DiagnosticResult, ResultSource};
use fallback::SimulatedScanner;
use obd_protocol::ObdClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ScannerConfig;
use crate::error::ScanError;

/// Runs trouble code scans against one transport
pub struct DiagnosticScanner {
    transport: Arc<dyn Transport>,
    config: ScannerConfig,
    filter: DeviceFilter,
    classifier: Classifier,
    fallback: SimulatedScanner,
    state: watch::Sender<AdapterState>,
    scanning: AtomicBool,
}

/// Clears the scanning flag however `scan` exits
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the open adapter connection for the length of a session.
///
/// If the scan future is dropped mid-session the connection is released in
/// the background and the published state goes back to `Disconnected`.
struct SessionGuard<'a> {
    connection: Option<Arc<dyn Connection>>,
    state: &'a watch::Sender<AdapterState>,
}

impl SessionGuard<'_> {
    async fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await;
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        warn!(
            "Scan cancelled, releasing connection to {}",
            connection.device_name()
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { connection.disconnect().await });
            }
            Err(_) => warn!("No runtime to disconnect {}", connection.device_name()),
        }
        self.state.send_replace(AdapterState::Disconnected);
    }
}

impl DiagnosticScanner {
    pub fn new(transport: Arc<dyn Transport>, config: ScannerConfig) -> Result<Self, ScanError> {
        config.validate()?;
        info!(
            "Creating diagnostic scanner (transport: {}, available: {})",
            transport.name(),
            transport.is_available()
        );

        let (state, _) = watch::channel(AdapterState::Disconnected);
        Ok(Self {
            filter: config.device_filter(),
            classifier: config.classifier()?,
            fallback: SimulatedScanner::new(config.simulation.clone()),
            transport,
            config,
            state,
            scanning: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Current adapter state
    pub fn state(&self) -> AdapterState {
        *self.state.borrow()
    }

    /// Watch adapter state changes
    pub fn subscribe_state(&self) -> watch::Receiver<AdapterState> {
        self.state.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    fn set_state(&self, next: AdapterState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!("Unexpected adapter state change {} -> {}", previous, next);
        }
        debug!("Adapter state: {} -> {}", previous, next);
    }

    /// Run one scan.
    ///
    /// Falls back to a simulated result in demo mode, when no BLE stack is
    /// present, or (if configured) when no adapter is found. Rejects with
    /// `Busy` while another scan is running.
    pub async fn scan(&self) -> Result<DiagnosticResult, ScanError> {
        self.scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::Busy)?;
        let _guard = ScanGuard(&self.scanning);

        if self.config.demo {
            info!("Demo mode, skipping adapter");
            return Ok(self.fallback.run().await);
        }
        if !self.transport.is_available() {
            warn!("No BLE capability ({}), using simulation", self.transport.name());
            return Ok(self.fallback.run().await);
        }

        self.set_state(AdapterState::Scanning);
        info!(
            "Scanning {}ms for adapters matching {:?}",
            self.config.scan_window_ms,
            self.filter.patterns()
        );
        let connection = match self
            .transport
            .connect(&self.filter, self.config.scan_window())
            .await
        {
            Ok(connection) => connection,
            Err(err) => {
                self.set_state(AdapterState::Disconnected);
                return self.on_connect_error(err).await;
            }
        };

        let session = SessionGuard {
            connection: Some(connection.clone()),
            state: &self.state,
        };
        let result = self.run_session(connection).await;
        session.release().await;
        self.set_state(AdapterState::Disconnected);

        match &result {
            Ok(result) => info!(
                "Scan complete: {} code(s), engine={:?}, brake={:?}",
                result.codes.len(),
                result.engine_status,
                result.brake_status
            ),
            Err(err) => error!("Scan failed: {}", err),
        }
        result
    }

    async fn on_connect_error(&self, err: TransportError) -> Result<DiagnosticResult, ScanError> {
        match err {
            TransportError::Unavailable => {
                warn!("BLE transport unavailable, using simulation");
                Ok(self.fallback.run().await)
            }
            TransportError::DeviceNotFound if self.config.simulate_if_not_found => {
                warn!("No adapter found, using simulation");
                Ok(self.fallback.run().await)
            }
            err => {
                error!("Connect failed: {}", err);
                Err(err.into())
            }
        }
    }

    async fn run_session(
        &self,
        connection: Arc<dyn Connection>,
    ) -> Result<DiagnosticResult, ScanError> {
        // Scan and GATT connect are one transport call
        self.set_state(AdapterState::Connecting);
        self.set_state(AdapterState::Connected);

        let device = connection.device_name().to_string();
        let mut client = ObdClient::new(connection, self.config.client_config());

        self.set_state(AdapterState::Initializing);
        let adapter = client.initialize().await?;
        if !adapter.probe_ok {
            warn!("Capability probe got no data; vehicle bus may be off");
        }
        self.set_state(AdapterState::Ready);

        self.set_state(AdapterState::Reading);
        let report = client.read_dtcs().await?;
        self.set_state(AdapterState::Ready);

        Ok(DiagnosticResult::new(
            &self.classifier,
            report.codes,
            ResultSource::Adapter { device },
        )
        .with_raw(report.raw)
        .with_adapter(adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_transport::{MockTransport, NullTransport};
    use fallback::SimulationConfig;

    fn fast_config() -> ScannerConfig {
        ScannerConfig {
            simulation: SimulationConfig::instant(),
            ..ScannerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_transport_simulates() {
        let scanner =
            DiagnosticScanner::new(Arc::new(NullTransport::default()), fast_config()).unwrap();
        let result = scanner.scan().await.unwrap();
        assert!(result.is_simulated());
        assert_eq!(scanner.state(), AdapterState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_mode_skips_transport() {
        let transport = Arc::new(MockTransport::new());
        let config = ScannerConfig {
            demo: true,
            ..fast_config()
        };
        let scanner = DiagnosticScanner::new(transport.clone(), config).unwrap();
        assert!(scanner.scan().await.unwrap().is_simulated());
        assert!(transport.last_connection().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_scan_rejected() {
        let transport = Arc::new(MockTransport::new());
        let scanner = Arc::new(DiagnosticScanner::new(transport, fast_config()).unwrap());

        let first = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.scan().await })
        };
        tokio::task::yield_now().await;
        assert!(scanner.is_scanning());
        assert!(matches!(scanner.scan().await, Err(ScanError::Busy)));

        assert!(first.await.unwrap().is_ok());
        assert!(!scanner.is_scanning());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScannerConfig {
            brake_critical_codes: vec!["nope".into()],
            ..ScannerConfig::default()
        };
        assert!(matches!(
            DiagnosticScanner::new(Arc::new(NullTransport::default()), config),
            Err(ScanError::Config(_))
        ));
    }
}
