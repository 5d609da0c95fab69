//! ELM327 Command Channel
//!
//! Sends one command at a time and assembles the adapter's reply from
//! notification fragments. A send resolves exactly once, on whichever
//! comes first:
//! - a terminal marker in the accumulated text (resolved),
//! - the command timeout (resolved with the partial text, or `NO DATA`),
//! - the connection closing (`ObdError::TransportClosed`).

use ble_transport::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::command::{Command, RawResponse};
use crate::error::ObdError;

/// Half-duplex command channel over one adapter connection
pub struct CommandChannel {
    connection: Arc<dyn Connection>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however `send` exits
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CommandChannel {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Whether a command is currently awaiting its response
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlight<'_>, ObdError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ObdError::CommandInFlight)?;
        Ok(InFlight(&self.in_flight))
    }

    /// Send a command and wait for its response.
    ///
    /// Rejects with `CommandInFlight` if another send has not resolved yet.
    pub async fn send(&self, command: &Command) -> Result<RawResponse, ObdError> {
        let _in_flight = self.begin()?;

        // Listen before writing so no early fragment is missed. Each send
        // owns a fresh subscription and buffer; both go away on return.
        let mut subscription = self.connection.subscribe()?;
        let mut response = RawResponse::new();

        // The timeout covers the write as well as the reply
        let deadline = Instant::now() + command.timeout();
        debug!("-> {}", command);
        match tokio::time::timeout_at(deadline, self.connection.write(command.as_bytes())).await {
            Ok(written) => written?,
            Err(_) => {
                warn!(
                    "Write of {} not acknowledged within {}ms",
                    command,
                    command.timeout().as_millis()
                );
                return Ok(response.into_timed_out());
            }
        }

        loop {
            match tokio::time::timeout_at(deadline, subscription.recv()).await {
                Ok(Some(fragment)) => {
                    let fragment = String::from_utf8_lossy(&fragment);
                    trace!("<~ {:?}", fragment);
                    if response.push(&fragment) {
                        debug!("<- {} {:?}", command, response.text());
                        return Ok(response);
                    }
                }
                Ok(None) => {
                    warn!("Connection closed while awaiting reply to {}", command);
                    return Err(ObdError::TransportClosed);
                }
                Err(_) => {
                    warn!(
                        "No terminal marker for {} within {}ms",
                        command,
                        command.timeout().as_millis()
                    );
                    return Ok(response.into_timed_out());
                }
            }
        }
    }
}
