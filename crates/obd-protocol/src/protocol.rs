//! OBD-II Protocol Selection

use serde::{Deserialize, Serialize};
use std::fmt;

/// OBD-II bus protocols selectable with `ATSP<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObdProtocol {
    /// Automatic protocol detection
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Get the ELM327 AT command for this protocol
    pub fn to_elm_command(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "ATSP0",
            ObdProtocol::J1850Pwm => "ATSP1",
            ObdProtocol::J1850Vpw => "ATSP2",
            ObdProtocol::Iso9141_2 => "ATSP3",
            ObdProtocol::Iso14230_4Kwp => "ATSP4",
            ObdProtocol::Iso14230_4KwpFast => "ATSP5",
            ObdProtocol::Iso15765_4Can11bit500 => "ATSP6",
            ObdProtocol::Iso15765_4Can29bit500 => "ATSP7",
            ObdProtocol::Iso15765_4Can11bit250 => "ATSP8",
            ObdProtocol::Iso15765_4Can29bit250 => "ATSP9",
        }
    }

    /// Human-readable protocol name
    pub fn description(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "Automatic",
            ObdProtocol::J1850Pwm => "SAE J1850 PWM",
            ObdProtocol::J1850Vpw => "SAE J1850 VPW",
            ObdProtocol::Iso9141_2 => "ISO 9141-2",
            ObdProtocol::Iso14230_4Kwp => "ISO 14230-4 KWP (5 baud init)",
            ObdProtocol::Iso14230_4KwpFast => "ISO 14230-4 KWP (fast init)",
            ObdProtocol::Iso15765_4Can11bit500 => "ISO 15765-4 CAN (11/500)",
            ObdProtocol::Iso15765_4Can29bit500 => "ISO 15765-4 CAN (29/500)",
            ObdProtocol::Iso15765_4Can11bit250 => "ISO 15765-4 CAN (11/250)",
            ObdProtocol::Iso15765_4Can29bit250 => "ISO 15765-4 CAN (29/250)",
        }
    }
}

impl Default for ObdProtocol {
    fn default() -> Self {
        ObdProtocol::Auto
    }
}

impl fmt::Display for ObdProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
