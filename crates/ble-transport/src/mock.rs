//! Scripted in-memory ELM327 adapter
//!
//! Answers the ELM327 command set the way a real BLE dongle does (echo
//! off, `ATS0` spacing, `ATH1` CAN headers) without any hardware.
//! Replies can be overridden per command, split into several
//! notifications, or withheld entirely to exercise timeouts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::filter::DeviceFilter;
use crate::hub::{FragmentHub, Subscription};
use crate::transport::{Connection, Transport};

/// How the mock answers one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Each entry is delivered as a separate notification
    Fragments(Vec<String>),
    /// Never answer
    Silent,
}

impl MockReply {
    /// Single-notification reply
    pub fn text(reply: &str) -> Self {
        MockReply::Fragments(vec![reply.to_string()])
    }
}

/// Reply for a command that has no scripted override
fn default_reply(command: &str) -> MockReply {
    let reply = match command {
        "ATZ" => "\r\rELM327 v1.5\r\r>",
        "0100" => "7E8064100BE3EB811\r\r>",
        "03" => "7E8024300\r\r>",
        cmd if cmd.starts_with("AT") => "OK\r\r>",
        _ => "?\r\r>",
    };
    MockReply::text(reply)
}

#[derive(Debug, Clone, Default)]
struct MockScript {
    replies: HashMap<String, MockReply>,
    fragment_size: Option<usize>,
    fail_writes: bool,
    write_delay: Option<Duration>,
}

/// A mock BLE capability that advertises a fixed set of device names
#[derive(Debug)]
pub struct MockTransport {
    devices: Vec<String>,
    available: bool,
    connect_error: Option<TransportError>,
    script: MockScript,
    last_connection: Mutex<Option<Arc<MockConnection>>>,
}

impl MockTransport {
    /// Mock with a single adapter advertised as `OBDII`
    pub fn new() -> Self {
        Self {
            devices: vec!["OBDII".to_string()],
            available: true,
            connect_error: None,
            script: MockScript::default(),
            last_connection: Mutex::new(None),
        }
    }

    /// Mock that reports no BLE stack
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Replace the advertised device names (scan order)
    pub fn with_devices<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = names.into_iter().map(Into::into).collect();
        self
    }

    /// Override the reply to one command
    pub fn with_reply(mut self, command: &str, reply: MockReply) -> Self {
        self.script
            .replies
            .insert(command.trim().to_uppercase(), reply);
        self
    }

    /// Never answer `command`
    pub fn with_silent(self, command: &str) -> Self {
        self.with_reply(command, MockReply::Silent)
    }

    /// Split every reply into notifications of at most `size` bytes
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.script.fragment_size = Some(size.max(1));
        self
    }

    /// Fail every characteristic write
    pub fn with_write_failure(mut self) -> Self {
        self.script.fail_writes = true;
        self
    }

    /// Hold every characteristic write for `delay` before it completes
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.script.write_delay = Some(delay);
        self
    }

    /// Fail `connect` with the given error after a device matched
    pub fn with_connect_error(mut self, error: TransportError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// The connection most recently handed out
    pub fn last_connection(&self) -> Option<Arc<MockConnection>> {
        self.last_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn connect(
        &self,
        filter: &DeviceFilter,
        scan_window: Duration,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable);
        }

        let name = match filter.first_match(self.devices.iter().map(String::as_str)) {
            Some(name) => name.to_string(),
            None => {
                // A real scan only gives up once the window has elapsed
                tokio::time::sleep(scan_window).await;
                return Err(TransportError::DeviceNotFound);
            }
        };

        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }

        info!("Mock transport connected to {}", name);
        let connection = Arc::new(MockConnection::new(name, self.script.clone()));
        *self
            .last_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(connection.clone());
        Ok(connection)
    }
}

/// Connection to the mock adapter
#[derive(Debug)]
pub struct MockConnection {
    name: String,
    hub: FragmentHub,
    connected: AtomicBool,
    script: MockScript,
    writes: Mutex<Vec<(String, Instant)>>,
    disconnects: Mutex<usize>,
}

impl MockConnection {
    fn new(name: String, script: MockScript) -> Self {
        Self {
            name,
            hub: FragmentHub::new(),
            connected: AtomicBool::new(true),
            script,
            writes: Mutex::new(Vec::new()),
            disconnects: Mutex::new(0),
        }
    }

    /// Commands written so far, without the trailing carriage return
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    /// Commands written so far with the instant each write happened
    pub fn write_log(&self) -> Vec<(String, Instant)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `disconnect` was called
    pub fn disconnect_calls(&self) -> usize {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of fragment listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    /// Push an unsolicited notification
    pub fn notify(&self, fragment: &str) {
        self.hub.publish(fragment.as_bytes());
    }

    fn reply_to(&self, command: &str) {
        let reply = self
            .script
            .replies
            .get(command)
            .cloned()
            .unwrap_or_else(|| default_reply(command));

        let MockReply::Fragments(fragments) = reply else {
            debug!("Mock adapter withholding reply to {}", command);
            return;
        };

        for fragment in fragments {
            match self.script.fragment_size {
                Some(size) => {
                    for chunk in fragment.as_bytes().chunks(size) {
                        self.hub.publish(chunk);
                    }
                }
                None => self.hub.publish(fragment.as_bytes()),
            }
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn device_name(&self) -> &str {
        &self.name
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        if self.script.fail_writes {
            return Err(TransportError::WriteFailed("mock write failure".to_string()));
        }
        if let Some(delay) = self.script.write_delay {
            tokio::time::sleep(delay).await;
        }

        let command = String::from_utf8_lossy(bytes)
            .trim_end_matches('\r')
            .trim()
            .to_uppercase();
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((command.clone(), Instant::now()));

        self.reply_to(&command);
        Ok(())
    }

    fn subscribe(&self) -> Result<Subscription, TransportError> {
        self.hub.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Mock adapter {} disconnected", self.name);
        }
        self.hub.close();
    }
}
