//! Adapter connection lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the adapter connection.
///
/// `Disconnected → Scanning → Connecting → Connected → Initializing →
/// Ready → (Reading → Ready)* → Disconnected`. A transport error in any
/// state moves straight back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Initializing,
    Ready,
    Reading,
}

impl AdapterState {
    /// Whether a connection to the adapter is open in this state
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            AdapterState::Connected
                | AdapterState::Initializing
                | AdapterState::Ready
                | AdapterState::Reading
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: AdapterState) -> bool {
        use AdapterState::*;

        if next == Disconnected {
            return true;
        }
        matches!(
            (self, next),
            (Disconnected, Scanning)
                | (Scanning, Connecting)
                | (Connecting, Connected)
                | (Connected, Initializing)
                | (Initializing, Ready)
                | (Ready, Reading)
                | (Reading, Ready)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterState::Disconnected => "disconnected",
            AdapterState::Scanning => "scanning",
            AdapterState::Connecting => "connecting",
            AdapterState::Connected => "connected",
            AdapterState::Initializing => "initializing",
            AdapterState::Ready => "ready",
            AdapterState::Reading => "reading",
        }
    }
}

impl Default for AdapterState {
    fn default() -> Self {
        AdapterState::Disconnected
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use AdapterState::*;
        let path = [
            Disconnected,
            Scanning,
            Connecting,
            Connected,
            Initializing,
            Ready,
            Reading,
            Ready,
            Disconnected,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_any_state_can_drop_to_disconnected() {
        use AdapterState::*;
        for state in [Scanning, Connecting, Connected, Initializing, Ready, Reading] {
            assert!(state.can_transition_to(Disconnected));
        }
    }

    #[test]
    fn test_cannot_skip_initialization() {
        assert!(!AdapterState::Connected.can_transition_to(AdapterState::Reading));
        assert!(!AdapterState::Connected.can_transition_to(AdapterState::Ready));
        assert!(!AdapterState::Disconnected.can_transition_to(AdapterState::Connected));
    }
}
