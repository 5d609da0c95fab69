//! Diagnostic scan result

use chrono::{DateTime, Utc};
use obd_protocol::{AdapterInfo, TroubleCode};
use serde::{Deserialize, Serialize};

use crate::catalog::{Interpretation, Severity};
use crate::classifier::{BrakeStatus, Classifier, EngineStatus};

/// Where a result came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultSource {
    /// Read from a connected adapter
    Adapter { device: String },
    /// Produced without hardware
    Simulated,
}

/// Outcome of one scan, owned by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    /// Decoded codes in reply order
    pub codes: Vec<TroubleCode>,
    pub engine_status: EngineStatus,
    pub brake_status: BrakeStatus,
    /// Last raw adapter reply; `None` for simulated results
    pub raw: Option<String>,
    pub source: ResultSource,
    /// Adapter details learned during init
    pub adapter: Option<AdapterInfo>,
    pub interpretations: Vec<Interpretation>,
    pub scanned_at: DateTime<Utc>,
}

impl DiagnosticResult {
    /// Classify `codes` into a new result
    pub fn new(classifier: &Classifier, codes: Vec<TroubleCode>, source: ResultSource) -> Self {
        let (engine_status, brake_status) = classifier.classify(&codes);
        let interpretations = classifier.interpret(&codes);
        Self {
            codes,
            engine_status,
            brake_status,
            raw: None,
            source,
            adapter: None,
            interpretations,
            scanned_at: Utc::now(),
        }
    }

    /// A no-fault result without hardware
    pub fn simulated() -> Self {
        Self::new(&Classifier::default(), Vec::new(), ResultSource::Simulated)
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterInfo) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn has_faults(&self) -> bool {
        !self.codes.is_empty()
    }

    pub fn is_simulated(&self) -> bool {
        self.source == ResultSource::Simulated
    }

    /// Highest per-code severity, if any code was found
    pub fn max_severity(&self) -> Option<Severity> {
        self.interpretations.iter().map(|i| i.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_result() {
        let codes = vec!["P0301".parse().unwrap(), "C0040".parse().unwrap()];
        let result = DiagnosticResult::new(
            &Classifier::default(),
            codes,
            ResultSource::Adapter {
                device: "OBDII".into(),
            },
        )
        .with_raw("7E806430201030104\r\r>");

        assert_eq!(result.engine_status, EngineStatus::CheckEngine);
        assert_eq!(result.brake_status, BrakeStatus::Urgent);
        assert_eq!(result.interpretations.len(), 2);
        assert_eq!(result.max_severity(), Some(Severity::Critical));
        assert!(result.has_faults());
        assert!(!result.is_simulated());
    }

    #[test]
    fn test_simulated_result() {
        let result = DiagnosticResult::simulated();
        assert!(result.codes.is_empty());
        assert_eq!(result.engine_status, EngineStatus::Ok);
        assert_eq!(result.brake_status, BrakeStatus::Ok);
        assert_eq!(result.raw, None);
        assert_eq!(result.max_severity(), None);
        assert!(result.is_simulated());
    }

    #[test]
    fn test_json_shape() {
        let result = DiagnosticResult::new(
            &Classifier::default(),
            vec!["C0999".parse().unwrap()],
            ResultSource::Adapter {
                device: "VGATE iCar".into(),
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["codes"][0], "C0999");
        assert_eq!(json["engine_status"], "check_engine");
        assert_eq!(json["brake_status"], "attention");
        assert_eq!(json["source"]["kind"], "adapter");
        assert_eq!(json["source"]["device"], "VGATE iCar");
        assert_eq!(json["interpretations"][0]["system"], "chassis");

        let back: DiagnosticResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
