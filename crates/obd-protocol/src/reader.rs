//! Mode 03 trouble code reader

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::channel::CommandChannel;
use crate::command::{Command, DEFAULT_TIMEOUT_MS};
use crate::dtc::{decode_dtcs, TroubleCode};
use crate::error::ObdError;
use crate::mode;

/// Outcome of one stored-code read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtcReport {
    /// Decoded codes in reply order
    pub codes: Vec<TroubleCode>,
    /// Raw adapter reply
    pub raw: String,
    /// Whether the read ended on the timeout rather than a terminal marker
    pub timed_out: bool,
}

/// Issues the Mode 03 request and decodes the reply.
///
/// No retries: an empty or unreadable reply is reported as zero codes.
/// Only transport failures are errors.
#[derive(Debug, Clone)]
pub struct DtcReader {
    timeout: Duration,
}

impl DtcReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The request command (`03`)
    pub fn command(&self) -> Command {
        Command::fixed(&format!("{:02X}", mode::READ_DTC)).with_timeout(self.timeout)
    }

    /// Read stored trouble codes
    pub async fn read(&self, channel: &CommandChannel) -> Result<DtcReport, ObdError> {
        let response = channel.send(&self.command()).await?;
        let timed_out = response.timed_out();
        if timed_out {
            warn!("Mode 03 read timed out; treating as no codes");
        }

        let raw = response.into_text();
        let codes = decode_dtcs(&raw);
        info!("Read {} stored trouble code(s)", codes.len());

        Ok(DtcReport {
            codes,
            raw,
            timed_out,
        })
    }
}

impl Default for DtcReader {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}
