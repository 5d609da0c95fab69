//! Built-in trouble code descriptions

use obd_protocol::{DtcSystem, TroubleCode};
use serde::{Deserialize, Serialize};

/// Per-code severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Annotation for one decoded code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub code: TroubleCode,
    pub system: DtcSystem,
    pub severity: Severity,
    pub brake_critical: bool,
    pub description: String,
}

const KNOWN: &[(&str, Severity, &str)] = &[
    ("P0100", Severity::Medium, "Mass air flow circuit malfunction"),
    ("P0101", Severity::Medium, "Mass air flow circuit range/performance"),
    ("P0103", Severity::Medium, "Mass air flow circuit high input"),
    ("P0128", Severity::Low, "Coolant temperature below thermostat regulating temperature"),
    ("P0171", Severity::Medium, "System too lean (bank 1)"),
    ("P0172", Severity::Medium, "System too rich (bank 1)"),
    ("P0300", Severity::High, "Random/multiple cylinder misfire detected"),
    ("P0301", Severity::High, "Cylinder 1 misfire detected"),
    ("P0302", Severity::High, "Cylinder 2 misfire detected"),
    ("P0303", Severity::High, "Cylinder 3 misfire detected"),
    ("P0304", Severity::High, "Cylinder 4 misfire detected"),
    ("P0420", Severity::Medium, "Catalyst system efficiency below threshold (bank 1)"),
    ("P0440", Severity::Low, "Evaporative emission control system malfunction"),
    ("P0442", Severity::Low, "Evaporative emission system small leak detected"),
    ("P0455", Severity::Low, "Evaporative emission system large leak detected"),
    ("P0500", Severity::Medium, "Vehicle speed sensor malfunction"),
    ("C0035", Severity::Critical, "Left front wheel speed sensor circuit"),
    ("C0040", Severity::Critical, "Right front wheel speed sensor circuit"),
    ("C0045", Severity::Critical, "Left rear wheel speed sensor circuit"),
    ("C0050", Severity::Critical, "Right rear wheel speed sensor circuit"),
    ("C0110", Severity::Critical, "ABS pump motor circuit"),
    ("C0121", Severity::Critical, "ABS valve relay circuit"),
    ("C0265", Severity::High, "EBCM motor relay circuit open"),
    ("B0001", Severity::High, "Driver frontal stage 1 deployment control"),
    ("U0100", Severity::High, "Lost communication with ECM/PCM"),
    ("U0121", Severity::High, "Lost communication with ABS control module"),
];

/// Catalog description for a code, or a generic one by system/subgroup
pub fn describe(code: &TroubleCode) -> String {
    let text = code.to_string();
    KNOWN
        .iter()
        .find(|(known, _, _)| *known == text)
        .map(|(_, _, description)| description.to_string())
        .unwrap_or_else(|| generic_description(code))
}

fn generic_description(code: &TroubleCode) -> String {
    let scope = if code.is_generic() {
        "generic"
    } else {
        "manufacturer-specific"
    };
    let area = match code.system() {
        DtcSystem::Powertrain => match code.digits().as_bytes().get(1) {
            Some(b'1' | b'2') => "fuel and air metering",
            Some(b'3') => "ignition system or misfire",
            Some(b'4') => "auxiliary emission controls",
            Some(b'5') => "vehicle speed and idle control",
            Some(b'6') => "computer output circuit",
            Some(b'7' | b'8' | b'9') => "transmission",
            _ => "powertrain",
        },
        DtcSystem::Chassis => "chassis (brakes, steering, suspension)",
        DtcSystem::Body => "body",
        DtcSystem::Network => "vehicle network communication",
    };
    format!("Unrecognized {} {} fault", scope, area)
}

fn default_severity(system: DtcSystem) -> Severity {
    match system {
        DtcSystem::Chassis => Severity::High,
        DtcSystem::Powertrain | DtcSystem::Network => Severity::Medium,
        DtcSystem::Body => Severity::Low,
    }
}

/// Annotate one code. Brake-critical codes are always `Critical`.
pub(crate) fn interpret(code: &TroubleCode, brake_critical: bool) -> Interpretation {
    let text = code.to_string();
    let known = KNOWN.iter().find(|(known, _, _)| *known == text);

    let severity = if brake_critical {
        Severity::Critical
    } else {
        known
            .map(|(_, severity, _)| *severity)
            .unwrap_or_else(|| default_severity(code.system()))
    };
    Interpretation {
        code: *code,
        system: code.system(),
        severity,
        brake_critical,
        description: describe(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(text: &str) -> TroubleCode {
        text.parse().unwrap()
    }

    #[test]
    fn test_known_code() {
        let interpretation = interpret(&code("P0301"), false);
        assert_eq!(interpretation.severity, Severity::High);
        assert_eq!(interpretation.description, "Cylinder 1 misfire detected");
        assert_eq!(interpretation.system, DtcSystem::Powertrain);
    }

    #[test]
    fn test_unknown_powertrain_subgroup() {
        assert_eq!(
            describe(&code("P0399")),
            "Unrecognized generic ignition system or misfire fault"
        );
        assert_eq!(
            describe(&code("P1745")),
            "Unrecognized manufacturer-specific transmission fault"
        );
    }

    #[test]
    fn test_unknown_code_severity_by_system() {
        assert_eq!(interpret(&code("C0999"), false).severity, Severity::High);
        assert_eq!(interpret(&code("B1234"), false).severity, Severity::Low);
        assert_eq!(interpret(&code("U0999"), false).severity, Severity::Medium);
    }

    #[test]
    fn test_brake_critical_forces_critical() {
        let interpretation = interpret(&code("C0999"), true);
        assert!(interpretation.brake_critical);
        assert_eq!(interpretation.severity, Severity::Critical);
    }
}
