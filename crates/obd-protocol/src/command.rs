//! ELM327 commands and their accumulated responses

use std::fmt;
use std::time::Duration;

use crate::error::ObdError;

/// Default command timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Substrings that end an ELM327 response, checked against the whole
/// accumulated buffer after every fragment
pub const TERMINAL_MARKERS: [&str; 4] = [">", "OK", "ERROR", "NO DATA"];

/// Substituted when a command times out with nothing received
const NO_DATA: &str = "NO DATA";

/// An outbound ELM327 instruction.
///
/// The wire text is ASCII and always ends with a single carriage return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    timeout: Duration,
    is_probe: bool,
}

impl Command {
    /// Build a command from its text, appending the carriage return
    pub fn new(text: &str) -> Result<Self, ObdError> {
        let body = text.trim_end_matches('\r');
        if body.trim().is_empty() {
            return Err(ObdError::InvalidCommand("empty command".to_string()));
        }
        if !body.is_ascii() || body.contains(['\r', '\n']) {
            return Err(ObdError::InvalidCommand(format!("{:?}", body)));
        }
        Ok(Self::fixed(body))
    }

    /// Commands whose text is known to be valid
    pub(crate) fn fixed(body: &str) -> Self {
        Self {
            text: format!("{}\r", body),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            is_probe: false,
        }
    }

    /// Set the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mark as the post-reset capability probe, whose ERROR reply is not fatal
    pub fn as_probe(mut self) -> Self {
        self.is_probe = true;
        self
    }

    /// Wire text including the trailing carriage return
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Command text without the carriage return
    pub fn name(&self) -> &str {
        self.text.trim_end_matches('\r')
    }

    /// Bytes for a single characteristic write
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_probe(&self) -> bool {
        self.is_probe
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text accumulated from notifications for one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    buffer: String,
    terminated: bool,
    timed_out: bool,
}

impl RawResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; returns true once a terminal marker has been seen
    pub fn push(&mut self, fragment: &str) -> bool {
        self.buffer.push_str(fragment);
        if !self.terminated {
            self.terminated = TERMINAL_MARKERS.iter().any(|m| self.buffer.contains(m));
        }
        self.terminated
    }

    /// Resolve without a terminal marker
    pub(crate) fn into_timed_out(mut self) -> Self {
        if self.buffer.is_empty() {
            self.buffer.push_str(NO_DATA);
        }
        self.timed_out = true;
        self
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn into_text(self) -> String {
        self.buffer
    }

    /// Whether a terminal marker was received
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether the response was resolved by the timeout
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_error(&self) -> bool {
        self.buffer.contains("ERROR")
    }

    pub fn is_unable_to_connect(&self) -> bool {
        self.buffer.contains("UNABLE TO CONNECT")
    }

    pub fn is_no_data(&self) -> bool {
        self.buffer.contains(NO_DATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_appends_carriage_return() {
        let cmd = Command::new("ATZ").unwrap();
        assert_eq!(cmd.text(), "ATZ\r");
        assert_eq!(cmd.name(), "ATZ");
        assert_eq!(cmd.as_bytes(), b"ATZ\r");
        assert_eq!(cmd.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(!cmd.is_probe());

        let cmd = Command::new("03\r").unwrap();
        assert_eq!(cmd.text(), "03\r");
    }

    #[test]
    fn test_invalid_commands_rejected() {
        assert!(Command::new("").is_err());
        assert!(Command::new("\r").is_err());
        assert!(Command::new("AT\rZ").is_err());
        assert!(Command::new("ATZ\u{e9}").is_err());
    }

    #[test]
    fn test_terminal_markers() {
        for marker in TERMINAL_MARKERS {
            let mut response = RawResponse::new();
            assert!(response.push(marker), "{} should terminate", marker);
        }

        let mut response = RawResponse::new();
        assert!(!response.push("7E8064100"));
        assert!(!response.push("BE3EB811\r"));
        assert!(response.push("\r>"));
        assert_eq!(response.text(), "7E8064100BE3EB811\r\r>");
    }

    #[test]
    fn test_marker_split_across_fragments() {
        let mut response = RawResponse::new();
        assert!(!response.push("NO DA"));
        assert!(response.push("TA"));
        assert!(response.is_no_data());
    }

    #[test]
    fn test_timed_out_empty_becomes_no_data() {
        let response = RawResponse::new().into_timed_out();
        assert_eq!(response.text(), "NO DATA");
        assert!(response.timed_out());
        assert!(!response.is_terminated());

        let mut partial = RawResponse::new();
        partial.push("43 01");
        let partial = partial.into_timed_out();
        assert_eq!(partial.text(), "43 01");
    }
}
