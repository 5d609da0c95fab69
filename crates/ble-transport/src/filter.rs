//! Advertised-name device filter

use serde::{Deserialize, Serialize};

/// Name substrings advertised by common ELM327 BLE adapters
pub const DEFAULT_NAME_FILTERS: [&str; 3] = ["OBD", "ELM", "VGATE"];

/// Selects candidate peripherals by advertised name.
///
/// A name matches when it contains any of the configured substrings,
/// compared case-insensitively. Selection is first-match: there is no
/// ranking and no RSSI comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Upper-cased substrings
    patterns: Vec<String>,
}

impl DeviceFilter {
    /// Create a filter from a list of name substrings
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Check whether an advertised name passes the filter
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_uppercase();
        self.patterns.iter().any(|p| name.contains(p.as_str()))
    }

    /// Return the first name that passes the filter
    pub fn first_match<'a, I>(&self, names: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().find(|name| self.matches(name))
    }

    /// Configured substrings (upper-cased)
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_FILTERS)
    }
}
