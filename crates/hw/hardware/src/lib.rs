//! `ocforge-hardware` --- the hardware report and what macOS can do with it.
//!
//! - [`report`]: the typed report model ([`HardwareReport`]).
//! - [`validate`]: the schema check run on every inbound report.
//! - [`ids`]: curated device id tables (Wi-Fi, Ethernet, codecs, CPU and
//!   GPU generations, chipsets).
//! - [`compat`]: the per-device supported macOS range and the set of devices
//!   that must be disabled for a target release.

#![warn(missing_docs)]

pub mod compat;
pub mod ids;
pub mod report;
pub mod validate;

pub use compat::{CompatibilityReport, OsRange};
pub use report::{CpuVendor, DeviceId, DeviceInfo, GpuType, HardwareReport, Platform, SimdFeatures};
pub use validate::{ValidationIssue, ValidationOutcome};

/// Errors raised while reading a hardware report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report is not valid JSON or does not fit the model.
    #[error("malformed hardware report: {0}")]
    Json(#[from] serde_json::Error),
    /// A device id is not `VVVV-DDDD`.
    #[error("invalid device id `{0}`")]
    InvalidDeviceId(String),
    /// The validator rejected the report.
    #[error("hardware report failed validation:\n{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<ValidationIssue>),
}

/// Validates `text` and returns the typed report.
///
/// Warnings are logged; any error aborts.
///
/// # Errors
///
/// Returns [`ReportError::Json`] on malformed JSON and
/// [`ReportError::Invalid`] when the validator reports errors.
pub fn load_report(text: &str) -> Result<HardwareReport, ReportError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let outcome = validate::validate(&value);
    for warning in &outcome.warnings {
        log::warn!("{warning}");
    }
    if !outcome.errors.is_empty() {
        return Err(ReportError::Invalid(outcome.errors));
    }
    HardwareReport::from_value(outcome.cleaned)
}
