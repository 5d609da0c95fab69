//! OBD-II Client for ELM327 Adapters
//!
//! Ties the command channel, init sequence and Mode 03 reader to one
//! adapter connection.

use ble_transport::Connection;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::channel::CommandChannel;
use crate::command::{Command, DEFAULT_TIMEOUT_MS};
use crate::error::ObdError;
use crate::init::{AdapterInfo, InitSequencer};
use crate::protocol::ObdProtocol;
use crate::reader::{DtcReader, DtcReport};

/// Settle delay after `ATZ`
const RESET_SETTLE_MS: u64 = 2000;

/// Settle delay after every other init command
const COMMAND_SETTLE_MS: u64 = 200;

/// Timing and protocol settings for one adapter session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bus protocol requested during init
    pub protocol: ObdProtocol,
    /// Timeout applied to every command
    pub command_timeout: Duration,
    /// Delay after the reset command
    pub reset_settle: Duration,
    /// Delay after each other init command
    pub command_settle: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: ObdProtocol::Auto,
            command_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            reset_settle: Duration::from_millis(RESET_SETTLE_MS),
            command_settle: Duration::from_millis(COMMAND_SETTLE_MS),
        }
    }
}

/// OBD-II client for an ELM327-compatible adapter
pub struct ObdClient {
    /// Advertised name of the adapter
    device: String,
    /// Session settings
    config: ClientConfig,
    /// Half-duplex command channel
    channel: CommandChannel,
    /// Set once the init sequence has completed
    adapter: Option<AdapterInfo>,
}

impl ObdClient {
    /// Create a client over an open connection
    pub fn new(connection: Arc<dyn Connection>, config: ClientConfig) -> Self {
        let device = connection.device_name().to_string();
        info!("Creating OBD client for device: {}", device);

        Self {
            device,
            config,
            channel: CommandChannel::new(connection),
            adapter: None,
        }
    }

    /// Run the ELM327 init sequence. Must complete before any read.
    pub async fn initialize(&mut self) -> Result<AdapterInfo, ObdError> {
        info!("Initializing OBD adapter {}", self.device);
        self.adapter = None;

        let info = InitSequencer::new(&self.config).run(&self.channel).await?;
        self.adapter = Some(info.clone());

        info!("OBD adapter initialized successfully");
        Ok(info)
    }

    /// Read stored trouble codes (Mode 03)
    pub async fn read_dtcs(&self) -> Result<DtcReport, ObdError> {
        if self.adapter.is_none() {
            return Err(ObdError::NotInitialized);
        }
        DtcReader::new(self.config.command_timeout)
            .read(&self.channel)
            .await
    }

    /// Switch bus protocol. Applied immediately when already initialized.
    pub async fn set_protocol(&mut self, protocol: ObdProtocol) -> Result<(), ObdError> {
        info!("Setting OBD protocol to {:?}", protocol);

        if let Some(adapter) = self.adapter.as_mut() {
            let command = Command::fixed(protocol.to_elm_command())
                .with_timeout(self.config.command_timeout);
            let response = self.channel.send(&command).await?;
            if response.is_error() {
                return Err(ObdError::InitializationFailed {
                    command: command.name().to_string(),
                    response: response.into_text(),
                });
            }
            adapter.protocol = protocol;
            tokio::time::sleep(self.config.command_settle).await;
        }

        self.config.protocol = protocol;
        Ok(())
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.command_timeout = timeout;
    }

    /// Check if the underlying connection is open
    pub fn is_connected(&self) -> bool {
        self.channel.connection().is_connected()
    }

    /// Check if the init sequence has completed
    pub fn is_initialized(&self) -> bool {
        self.adapter.is_some()
    }

    /// Adapter details learned during init
    pub fn adapter_info(&self) -> Option<&AdapterInfo> {
        self.adapter.as_ref()
    }

    /// Get current protocol
    pub fn protocol(&self) -> ObdProtocol {
        self.config.protocol
    }

    /// Advertised name of the adapter
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Disconnect from the OBD adapter
    pub async fn disconnect(&mut self) {
        if self.channel.is_busy() {
            warn!("Disconnecting with a command still in flight");
        }
        info!("Disconnecting OBD client");
        self.adapter = None;
        self.channel.connection().disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_transport::mock::MockReply;
    use ble_transport::{DeviceFilter, MockTransport, Transport};

    async fn client_for(transport: &MockTransport) -> ObdClient {
        let conn = transport
            .connect(&DeviceFilter::default(), Duration::from_millis(10))
            .await
            .unwrap();
        ObdClient::new(conn, ClientConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_requires_initialization() {
        let transport = MockTransport::new();
        let client = client_for(&transport).await;
        assert!(matches!(client.read_dtcs().await, Err(ObdError::NotInitialized)));
        assert!(transport.last_connection().unwrap().writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_then_read() {
        let transport = MockTransport::new()
            .with_reply("03", MockReply::text("7E8044301C035\r\r>"));
        let mut client = client_for(&transport).await;

        let info = client.initialize().await.unwrap();
        assert!(client.is_initialized());
        assert_eq!(client.adapter_info(), Some(&info));

        let report = client.read_dtcs().await.unwrap();
        assert_eq!(report.codes.len(), 1);
        assert_eq!(report.codes[0].to_string(), "U0035");
        assert_eq!(transport.last_connection().unwrap().writes().last().unwrap(), "03");
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_change_after_init() {
        let transport = MockTransport::new();
        let mut client = client_for(&transport).await;
        client.initialize().await.unwrap();
        client
            .set_protocol(ObdProtocol::Iso15765_4Can29bit500)
            .await
            .unwrap();
        assert_eq!(client.protocol(), ObdProtocol::Iso15765_4Can29bit500);
        assert_eq!(transport.last_connection().unwrap().writes().last().unwrap(), "ATSP7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect() {
        let transport = MockTransport::new();
        let mut client = client_for(&transport).await;
        assert!(client.is_connected());
        client.disconnect().await;
        assert!(!client.is_connected());
        assert!(!client.is_initialized());
    }
}
