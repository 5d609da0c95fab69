//! Adapter Initialization Sequence
//!
//! Runs the fixed reset/configuration commands against a freshly
//! connected ELM327. Each step waits a settle delay before the next
//! command is sent: real adapters garble replies without it, and the
//! reset needs far longer than the configuration commands.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::channel::CommandChannel;
use crate::client::ClientConfig;
use crate::command::{Command, RawResponse};
use crate::error::ObdError;
use crate::protocol::ObdProtocol;

/// One command of the init sequence plus its post-command delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitStep {
    pub command: Command,
    pub settle: Duration,
}

/// What the init sequence learned about the adapter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Identification line from the reset reply, e.g. `ELM327 v1.5`
    pub identity: Option<String>,
    /// Protocol requested with `ATSP`
    pub protocol: ObdProtocol,
    /// Whether the Mode 01 PID 00 probe got a data reply
    pub probe_ok: bool,
}

/// Runs the fixed ELM327 configuration sequence
#[derive(Debug, Clone)]
pub struct InitSequencer {
    steps: Vec<InitStep>,
    protocol: ObdProtocol,
}

impl InitSequencer {
    /// Build the standard sequence:
    /// `ATZ`, `ATE0`, `ATL0`, `ATS0`, `ATH1`, `ATAT1`, `ATSP<n>`, then the `0100` probe
    pub fn new(config: &ClientConfig) -> Self {
        let step = |command: Command, settle: Duration| InitStep {
            command: command.with_timeout(config.command_timeout),
            settle,
        };

        let mut steps = vec![step(Command::fixed("ATZ"), config.reset_settle)];
        for text in ["ATE0", "ATL0", "ATS0", "ATH1", "ATAT1"] {
            steps.push(step(Command::fixed(text), config.command_settle));
        }
        steps.push(step(
            Command::fixed(config.protocol.to_elm_command()),
            config.command_settle,
        ));
        steps.push(step(
            Command::fixed("0100").as_probe(),
            config.command_settle,
        ));

        Self {
            steps,
            protocol: config.protocol,
        }
    }

    pub fn steps(&self) -> &[InitStep] {
        &self.steps
    }

    /// Run every step in order.
    ///
    /// Aborts with `InitializationFailed` on the first non-probe command
    /// answered with `ERROR`; later commands are not sent. `UNABLE TO
    /// CONNECT` is logged and the sequence continues.
    pub async fn run(&self, channel: &CommandChannel) -> Result<AdapterInfo, ObdError> {
        info!("Initializing adapter ({} steps)", self.steps.len());
        let mut info = AdapterInfo {
            protocol: self.protocol,
            ..AdapterInfo::default()
        };

        for step in &self.steps {
            let command = &step.command;
            let response = channel.send(command).await?;

            if response.is_unable_to_connect() {
                warn!("{}: adapter unable to connect to vehicle bus", command);
            } else if response.is_error() {
                if command.is_probe() {
                    warn!("{}: probe answered ERROR, continuing", command);
                } else {
                    error!("{}: adapter answered {:?}", command, response.text());
                    return Err(ObdError::InitializationFailed {
                        command: command.name().to_string(),
                        response: response.into_text(),
                    });
                }
            } else if response.timed_out() {
                warn!("{}: no reply, continuing", command);
            }

            if command.name() == "ATZ" {
                info.identity = parse_identity(&response);
                if let Some(identity) = &info.identity {
                    info!("Adapter identifies as {}", identity);
                }
            }
            if command.is_probe() {
                info.probe_ok = !response.timed_out()
                    && !response.is_error()
                    && !response.is_unable_to_connect()
                    && !response.is_no_data();
            }

            tokio::time::sleep(step.settle).await;
        }

        info!("Adapter ready");
        Ok(info)
    }
}

/// Pick the identification line out of a reset reply
fn parse_identity(response: &RawResponse) -> Option<String> {
    if response.timed_out() {
        return None;
    }
    response
        .text()
        .split(['\r', '\n'])
        .map(|line| line.trim_matches(|c: char| c == '>' || c.is_whitespace()))
        .find(|line| !line.is_empty() && *line != "ATZ" && *line != "OK")
        .map(str::to_string)
}
