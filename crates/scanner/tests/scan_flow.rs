//! End-to-end scans against the scripted ELM327 mock

use ble_transport::mock::MockReply;
use ble_transport::{AdapterState, Connection, MockTransport, TransportError};
use fallback::SimulationConfig;
use obd_protocol::ObdProtocol;
use obd_scanner::{
    BrakeStatus, DiagnosticScanner, EngineStatus, ResultSource, ScanError, ScannerConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config() -> ScannerConfig {
    ScannerConfig {
        simulation: SimulationConfig::instant(),
        ..ScannerConfig::default()
    }
}

fn scanner(transport: &Arc<MockTransport>, config: ScannerConfig) -> DiagnosticScanner {
    DiagnosticScanner::new(transport.clone(), config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_full_scan_classifies_codes() {
    let transport = Arc::new(
        MockTransport::new().with_reply("03", MockReply::text("7E806430240400301\r\r>")),
    );
    let scanner = scanner(&transport, config());

    let result = scanner.scan().await.unwrap();
    let codes: Vec<String> = result.codes.iter().map(ToString::to_string).collect();
    assert_eq!(codes, ["C0040", "P0301"]);
    assert_eq!(result.engine_status, EngineStatus::CheckEngine);
    assert_eq!(result.brake_status, BrakeStatus::Urgent);
    assert_eq!(result.raw.as_deref(), Some("7E806430240400301\r\r>"));
    assert_eq!(
        result.source,
        ResultSource::Adapter {
            device: "OBDII".into()
        }
    );

    let adapter = result.adapter.as_ref().unwrap();
    assert_eq!(adapter.identity.as_deref(), Some("ELM327 v1.5"));
    assert!(adapter.probe_ok);

    let conn = transport.last_connection().unwrap();
    assert_eq!(
        conn.writes(),
        ["ATZ", "ATE0", "ATL0", "ATS0", "ATH1", "ATAT1", "ATSP0", "0100", "03"]
    );
    assert_eq!(conn.disconnect_calls(), 1);
    assert!(!conn.is_connected());
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_no_stored_codes() {
    let transport = Arc::new(MockTransport::new());
    let result = scanner(&transport, config()).scan().await.unwrap();
    assert!(result.codes.is_empty());
    assert_eq!(result.engine_status, EngineStatus::Ok);
    assert_eq!(result.brake_status, BrakeStatus::Ok);
    assert!(!result.is_simulated());
}

#[tokio::test(start_paused = true)]
async fn test_padding_and_chassis_attention() {
    let transport = Arc::new(
        MockTransport::new().with_reply("03", MockReply::text("7E8064302000049 99\r\r>")),
    );
    let result = scanner(&transport, config()).scan().await.unwrap();
    let codes: Vec<String> = result.codes.iter().map(ToString::to_string).collect();
    assert_eq!(codes, ["C0999"]);
    assert_eq!(result.brake_status, BrakeStatus::Attention);
}

#[tokio::test(start_paused = true)]
async fn test_read_timeout_reports_no_faults() {
    let transport = Arc::new(MockTransport::new().with_silent("03"));
    let config = ScannerConfig {
        command_timeout_ms: 500,
        ..config()
    };
    let result = scanner(&transport, config).scan().await.unwrap();
    assert!(result.codes.is_empty());
    assert_eq!(result.engine_status, EngineStatus::Ok);
    assert_eq!(result.raw.as_deref(), Some("NO DATA"));
    assert!(!result.is_simulated());
}

#[tokio::test(start_paused = true)]
async fn test_state_follows_scan_lifecycle() {
    let transport = Arc::new(MockTransport::new().with_silent("03"));
    let config = ScannerConfig {
        command_timeout_ms: 500,
        ..config()
    };
    let scanner = Arc::new(scanner(&transport, config));
    let mut states = scanner.subscribe_state();
    assert_eq!(*states.borrow(), AdapterState::Disconnected);

    let scan = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.scan().await })
    };

    states
        .wait_for(|s| *s == AdapterState::Initializing)
        .await
        .unwrap();
    states
        .wait_for(|s| *s == AdapterState::Reading)
        .await
        .unwrap();
    assert!(scanner.state().is_connected());

    scan.await.unwrap().unwrap();
    assert_eq!(*states.borrow_and_update(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_init_error_aborts_and_disconnects() {
    let transport = Arc::new(MockTransport::new().with_reply("ATE0", MockReply::text("ERROR\r\r>")));
    let scanner = scanner(&transport, config());

    let err = scanner.scan().await.unwrap_err();
    match &err {
        ScanError::InitializationFailed { command, .. } => assert_eq!(command, "ATE0"),
        other => panic!("expected InitializationFailed, got {:?}", other),
    }
    assert!(err.hint().contains("ignition"));

    let conn = transport.last_connection().unwrap();
    assert_eq!(conn.writes(), ["ATZ", "ATE0"]);
    assert_eq!(conn.disconnect_calls(), 1);
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_disconnects() {
    let transport = Arc::new(MockTransport::new().with_write_failure());
    let scanner = scanner(&transport, config());

    assert!(matches!(
        scanner.scan().await,
        Err(ScanError::WriteFailed(_))
    ));
    assert_eq!(transport.last_connection().unwrap().disconnect_calls(), 1);
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_read_fails_fast() {
    let transport = Arc::new(MockTransport::new().with_silent("03"));
    let scanner = Arc::new(scanner(&transport, config()));
    let mut states = scanner.subscribe_state();

    let scan = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.scan().await })
    };
    states
        .wait_for(|s| *s == AdapterState::Reading)
        .await
        .unwrap();

    let start = Instant::now();
    transport.last_connection().unwrap().disconnect().await;
    let result = scan.await.unwrap();

    assert!(matches!(result, Err(ScanError::ConnectionLost)));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_adapter_not_found_falls_back() {
    let transport = Arc::new(MockTransport::new().with_devices(["JBL Flip", "Pixel 8"]));
    let scanner = scanner(&transport, config());

    let start = Instant::now();
    let result = scanner.scan().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(10_000));
    assert!(result.is_simulated());
    assert!(result.codes.is_empty());
    assert_eq!(result.engine_status, EngineStatus::Ok);
    assert_eq!(result.brake_status, BrakeStatus::Ok);
    assert!(transport.last_connection().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_adapter_not_found_without_fallback() {
    let transport = Arc::new(MockTransport::new().with_devices(["JBL Flip"]));
    let config = ScannerConfig {
        simulate_if_not_found: false,
        scan_window_ms: 2000,
        ..config()
    };
    let scanner = scanner(&transport, config);

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, ScanError::AdapterNotFound));
    assert!(err.is_retryable());
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_name_filter_is_case_insensitive() {
    let transport = Arc::new(MockTransport::new().with_devices(["Speaker", "vgate iCar Pro"]));
    let result = scanner(&transport, config()).scan().await.unwrap();
    assert_eq!(
        result.source,
        ResultSource::Adapter {
            device: "vgate iCar Pro".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_transport_simulates() {
    let transport = Arc::new(MockTransport::unavailable());
    let result = scanner(&transport, config()).scan().await.unwrap();
    assert!(result.is_simulated());
    assert!(result.raw.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_surfaces() {
    let transport =
        Arc::new(MockTransport::new().with_connect_error(TransportError::PermissionDenied));
    let scanner = scanner(&transport, config());

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, ScanError::PermissionDenied));
    assert!(err.hint().contains("permission"));
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_configured_protocol_is_selected() {
    let transport = Arc::new(MockTransport::new());
    let config = ScannerConfig {
        protocol: ObdProtocol::Iso15765_4Can11bit500,
        ..config()
    };
    scanner(&transport, config).scan().await.unwrap();
    let writes = transport.last_connection().unwrap().writes();
    assert_eq!(writes[6], "ATSP6");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_scan_releases_adapter() {
    let transport = Arc::new(MockTransport::new().with_silent("03"));
    let scanner = scanner(&transport, config());

    let cancelled = tokio::time::timeout(Duration::from_secs(5), scanner.scan()).await;
    assert!(cancelled.is_err());
    tokio::time::sleep(Duration::from_millis(1)).await;

    let conn = transport.last_connection().unwrap();
    assert!(!conn.is_connected());
    assert_eq!(conn.disconnect_calls(), 1);
    assert_eq!(conn.listener_count(), 0);
    assert_eq!(scanner.state(), AdapterState::Disconnected);
    assert!(!scanner.is_scanning());

    let result = scanner.scan().await.unwrap();
    assert_eq!(result.raw.as_deref(), Some("NO DATA"));
    assert_eq!(transport.last_connection().unwrap().disconnect_calls(), 1);
    assert_eq!(scanner.state(), AdapterState::Disconnected);
}
