//! Diagnostic Trouble Codes
//!
//! SAE J2012 encodes a code in two bytes: the top two bits select the
//! system letter, the remaining fourteen bits form the digits.
//!
//! ```text
//!   byte A                 byte B
//!   7 6 | 5 4 | 3 2 1 0    7 6 5 4 | 3 2 1 0
//!   sys | d1  |   d2       d3      | d4
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::ObdError;
use crate::mode;

/// Hex characters of header allowed before the `43` response byte
/// before the prefix is treated as an unusually long device header
const MAX_HEADER_HEX_CHARS: usize = 12;

/// DTC system, selected by the top two bits of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtcSystem {
    /// P - engine and transmission
    Powertrain,
    /// C - brakes, steering, suspension
    Chassis,
    /// B - body and cabin
    Body,
    /// U - vehicle network
    Network,
}

impl DtcSystem {
    const TABLE: [DtcSystem; 4] = [
        DtcSystem::Powertrain,
        DtcSystem::Chassis,
        DtcSystem::Body,
        DtcSystem::Network,
    ];

    /// System encoded in the first DTC byte
    pub fn from_first_byte(byte: u8) -> Self {
        Self::TABLE[((byte >> 6) & 0b11) as usize]
    }

    pub fn letter(&self) -> char {
        match self {
            DtcSystem::Powertrain => 'P',
            DtcSystem::Chassis => 'C',
            DtcSystem::Body => 'B',
            DtcSystem::Network => 'U',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'P' => Some(DtcSystem::Powertrain),
            'C' => Some(DtcSystem::Chassis),
            'B' => Some(DtcSystem::Body),
            'U' => Some(DtcSystem::Network),
            _ => None,
        }
    }
}

/// A decoded 5-character trouble code such as `P0301`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TroubleCode {
    system: DtcSystem,
    /// Uppercase ASCII hex digits; the first is always 0-3
    digits: [u8; 4],
}

fn hex_digit(nibble: u8) -> u8 {
    b"0123456789ABCDEF"[(nibble & 0x0F) as usize]
}

impl TroubleCode {
    /// Decode the two bytes of one Mode 03 code slot
    pub fn from_bytes(first: u8, second: u8) -> Self {
        Self {
            system: DtcSystem::from_first_byte(first),
            digits: [
                hex_digit((first >> 4) & 0b11),
                hex_digit(first & 0x0F),
                hex_digit(second >> 4),
                hex_digit(second & 0x0F),
            ],
        }
    }

    pub fn system(&self) -> DtcSystem {
        self.system
    }

    /// The four characters following the system letter
    pub fn digits(&self) -> &str {
        // Digits are only ever built from ASCII hex characters
        std::str::from_utf8(&self.digits).unwrap_or("0000")
    }

    /// Whether the code is SAE-defined (first digit 0 or 2) rather than
    /// manufacturer-specific
    pub fn is_generic(&self) -> bool {
        matches!(self.digits[0], b'0' | b'2')
    }
}

impl fmt::Display for TroubleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.system.letter(), self.digits())
    }
}

impl FromStr for TroubleCode {
    type Err = ObdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ObdError::InvalidTroubleCode(s.to_string());
        let code = s.trim().to_ascii_uppercase();
        let bytes = code.as_bytes();
        if bytes.len() != 5 {
            return Err(invalid());
        }

        let system = DtcSystem::from_letter(bytes[0] as char).ok_or_else(invalid)?;
        if !(b'0'..=b'3').contains(&bytes[1]) || !bytes[2..].iter().all(u8::is_ascii_hexdigit) {
            return Err(invalid());
        }

        let mut digits = [0u8; 4];
        digits.copy_from_slice(&bytes[1..]);
        Ok(Self { system, digits })
    }
}

impl From<TroubleCode> for String {
    fn from(code: TroubleCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for TroubleCode {
    type Error = ObdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parse exactly two hex characters
fn parse_hex_byte(text: &str) -> Option<u8> {
    if text.len() == 2 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        u8::from_str_radix(text, 16).ok()
    } else {
        None
    }
}

/// Decode a raw Mode 03 reply into trouble codes, in reply order.
///
/// Never fails: an empty, unrecognised or malformed reply yields no codes.
///
/// 1. Whitespace and `>` are removed and the text upper-cased.
/// 2. `NO DATA`, `UNABLE TO CONNECT` or fewer than 4 characters: no codes.
/// 3. Everything before the first `43` (Mode 03 positive response) is
///    header and dropped; no `43` means no codes.
/// 4. The next byte is the code count; zero or unparsable means no codes.
/// 5. Up to `count` 4-character slots follow. `0000` and `FFFF` slots are
///    padding and produce nothing.
pub fn decode_dtcs(raw: &str) -> Vec<TroubleCode> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '>')
        .collect::<String>()
        .to_uppercase();

    if cleaned.contains("NODATA") || cleaned.contains("UNABLETOCONNECT") || cleaned.len() < 4 {
        return Vec::new();
    }

    let prefix = format!("{:02X}", mode::READ_DTC + mode::POSITIVE_RESPONSE_OFFSET);
    let Some(offset) = cleaned.find(&prefix) else {
        debug!("Mode 03 reply without {} header: {:?}", prefix, cleaned);
        return Vec::new();
    };
    if offset > MAX_HEADER_HEX_CHARS {
        debug!("Discarding {} characters of device header", offset);
    }

    let payload = &cleaned[offset + prefix.len()..];
    let count = match payload.get(..2).and_then(parse_hex_byte) {
        Some(count) if count > 0 => count as usize,
        _ => return Vec::new(),
    };
    let slots = &payload[2..];

    let mut codes = Vec::with_capacity(count);
    for index in 0..count {
        let start = index * 4;
        let Some(chunk) = slots.get(start..start + 4) else {
            break;
        };
        if chunk == "0000" || chunk == "FFFF" {
            continue;
        }

        match (
            chunk.get(..2).and_then(parse_hex_byte),
            chunk.get(2..).and_then(parse_hex_byte),
        ) {
            (Some(first), Some(second)) => codes.push(TroubleCode::from_bytes(first, second)),
            _ => debug!("Skipping malformed DTC slot {:?}", chunk),
        }
    }
    codes
}
