//! Trouble Code Interpretation
//!
//! Maps decoded trouble codes to the engine/brake status shown to the
//! driver, and annotates each code with a severity and description.
//! Everything here is pure and safe to call from any thread.

mod catalog;
mod classifier;
mod result;

pub use catalog::{describe, Interpretation, Severity};
pub use classifier::{BrakeStatus, Classifier, EngineStatus, DEFAULT_BRAKE_CRITICAL_CODES};
pub use result::{DiagnosticResult, ResultSource};
