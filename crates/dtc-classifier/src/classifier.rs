//! Engine and brake status classification

use obd_protocol::{DtcSystem, ObdError, TroubleCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::catalog::{self, Interpretation};

/// Chassis codes that make the brake status urgent
pub const DEFAULT_BRAKE_CRITICAL_CODES: [&str; 6] =
    ["C0035", "C0040", "C0045", "C0050", "C0110", "C0121"];

/// Engine lamp status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    #[default]
    Ok,
    CheckEngine,
}

/// Brake system status, ordered by urgency
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BrakeStatus {
    #[default]
    Ok,
    Attention,
    Urgent,
}

/// Status classifier with a configurable brake-critical code set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    brake_critical: BTreeSet<TroubleCode>,
}

impl Classifier {
    /// Build a classifier from code strings such as `"C0040"`
    pub fn new<I, S>(brake_critical: I) -> Result<Self, ObdError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let brake_critical = brake_critical
            .into_iter()
            .map(|code| code.as_ref().trim().parse())
            .collect::<Result<BTreeSet<TroubleCode>, _>>()?;
        Ok(Self { brake_critical })
    }

    pub fn is_brake_critical(&self, code: &TroubleCode) -> bool {
        self.brake_critical.contains(code)
    }

    pub fn brake_critical_codes(&self) -> impl Iterator<Item = &TroubleCode> {
        self.brake_critical.iter()
    }

    /// `check_engine` when any code is present
    pub fn engine_status(&self, codes: &[TroubleCode]) -> EngineStatus {
        if codes.is_empty() {
            EngineStatus::Ok
        } else {
            EngineStatus::CheckEngine
        }
    }

    /// `urgent` if any code is brake-critical, else `attention` if any
    /// code is a chassis code, else `ok`
    pub fn brake_status(&self, codes: &[TroubleCode]) -> BrakeStatus {
        if codes.iter().any(|code| self.is_brake_critical(code)) {
            return BrakeStatus::Urgent;
        }
        if codes.iter().any(|code| code.system() == DtcSystem::Chassis) {
            return BrakeStatus::Attention;
        }
        BrakeStatus::Ok
    }

    /// Both statuses for one code list
    pub fn classify(&self, codes: &[TroubleCode]) -> (EngineStatus, BrakeStatus) {
        let engine = self.engine_status(codes);
        let brake = self.brake_status(codes);
        debug!(
            "Classified {} code(s): engine={:?} brake={:?}",
            codes.len(),
            engine,
            brake
        );
        (engine, brake)
    }

    /// Per-code annotations, in input order
    pub fn interpret(&self, codes: &[TroubleCode]) -> Vec<Interpretation> {
        codes
            .iter()
            .map(|code| catalog::interpret(code, self.is_brake_critical(code)))
            .collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let brake_critical = DEFAULT_BRAKE_CRITICAL_CODES
            .iter()
            .filter_map(|code| code.parse().ok())
            .collect();
        Self { brake_critical }
    }
}
