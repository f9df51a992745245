//! Hardware report schema validation.
//!
//! The validator walks the raw JSON against a declarative schema. Unknown
//! categories and keys are warnings and are dropped from the cleaned copy;
//! missing required keys and values that break a field rule are errors.
//! Cleaning a valid report returns it unchanged.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted JSON path (`CPU.Manufacturer`, `GPU.Radeon RX 580.Device ID`).
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// The report with unknown categories and keys removed.
    pub cleaned: Value,
    /// Blocking problems.
    pub errors: Vec<ValidationIssue>,
    /// Non-blocking problems.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    /// Returns `true` if there are no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    DeviceId,
    PciPath,
    AcpiPath,
    Decimal,
}

static DEVICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(Pattern::DeviceId.source()).expect("device id pattern is valid"));
static PCI_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(Pattern::PciPath.source()).expect("PCI path pattern is valid"));
static ACPI_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(Pattern::AcpiPath.source()).expect("ACPI path pattern is valid"));
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(Pattern::Decimal.source()).expect("decimal pattern is valid"));

impl Pattern {
    const fn source(self) -> &'static str {
        match self {
            Self::DeviceId => r"^[0-9A-F]{4}-[0-9A-F]{4}$",
            Self::PciPath => r"^PciRoot\(0x[0-9a-fA-F]+\)(/Pci\(0x[0-9a-fA-F]+,0x[0-9a-fA-F]+\))+$",
            Self::AcpiPath => r"^\\?_SB(\.[A-Z0-9_]+)+$",
            Self::Decimal => r"^\d+$",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::DeviceId => &DEVICE_ID,
            Self::PciPath => &PCI_PATH,
            Self::AcpiPath => &ACPI_PATH,
            Self::Decimal => &DECIMAL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Text,
    Matches(Pattern),
    OneOf(&'static [&'static str]),
    TextList,
}

#[derive(Debug, Clone, Copy)]
struct Field {
    key: &'static str,
    required: bool,
    rule: Rule,
}

const fn opt(key: &'static str, rule: Rule) -> Field {
    Field { key, required: false, rule }
}

const fn req(key: &'static str, rule: Rule) -> Field {
    Field { key, required: true, rule }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Single,
    Map,
}

struct Category {
    key: &'static str,
    required: bool,
    shape: Shape,
    fields: &'static [&'static [Field]],
}

const BUS_TYPES: &[&str] = &["PCI", "USB", "ACPI", "ROOT"];

const BUS: &[Field] = &[
    opt("Bus Type", Rule::OneOf(BUS_TYPES)),
    opt("Device ID", Rule::Matches(Pattern::DeviceId)),
    opt("Subsystem ID", Rule::Matches(Pattern::DeviceId)),
    opt("PCI Path", Rule::Matches(Pattern::PciPath)),
    opt("ACPI Path", Rule::Matches(Pattern::AcpiPath)),
];

const GENERIC: &[Field] = &[opt("Device", Rule::Text), opt("Device Type", Rule::Text)];

const MOTHERBOARD: &[Field] = &[
    req("Name", Rule::Text),
    req("Chipset", Rule::Text),
    req("Platform", Rule::OneOf(&["Desktop", "Laptop"])),
];

const BIOS: &[Field] = &[
    opt("Firmware Type", Rule::Text),
    opt("Secure Boot", Rule::Text),
    opt("Resizable BAR", Rule::Text),
];

const CPU: &[Field] = &[
    req("Manufacturer", Rule::OneOf(&["Intel", "AMD"])),
    req("Processor Name", Rule::Text),
    req("Codename", Rule::Text),
    req("Core Count", Rule::Matches(Pattern::Decimal)),
    req("CPU Count", Rule::Matches(Pattern::Decimal)),
    opt("SIMD Features", Rule::Text),
];

const GPU: &[Field] = &[
    opt("Manufacturer", Rule::Text),
    opt("Codename", Rule::Text),
    req("Device Type", Rule::OneOf(&["Integrated GPU", "Discrete GPU", "Unknown"])),
];

const MONITOR: &[Field] = &[
    opt("Connector Type", Rule::Text),
    opt("Connected GPU", Rule::Text),
    opt("Resolution", Rule::Text),
];

const SOUND: &[Field] = &[opt("Audio Endpoints", Rule::TextList)];

const fn devices(key: &'static str) -> Category {
    Category { key, required: false, shape: Shape::Map, fields: &[BUS, GENERIC] }
}

const SCHEMA: &[Category] = &[
    Category { key: "Motherboard", required: true, shape: Shape::Single, fields: &[MOTHERBOARD] },
    Category { key: "BIOS", required: false, shape: Shape::Single, fields: &[BIOS] },
    Category { key: "CPU", required: true, shape: Shape::Single, fields: &[CPU] },
    Category { key: "GPU", required: false, shape: Shape::Map, fields: &[BUS, GPU] },
    Category { key: "Monitor", required: false, shape: Shape::Map, fields: &[MONITOR] },
    devices("Network"),
    Category { key: "Sound", required: false, shape: Shape::Map, fields: &[BUS, SOUND] },
    devices("USB Controllers"),
    devices("Input"),
    devices("Storage Controllers"),
    devices("Bluetooth"),
    devices("SD Controller"),
    devices("Biometric"),
    devices("System Devices"),
];

#[derive(Default)]
struct Collector {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Collector {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue { path: path.into(), message: message.into() });
    }
}

fn check_rule(rule: Rule, value: &Value, path: &str, out: &mut Collector) {
    match rule {
        Rule::Text => {
            if !value.is_string() {
                out.error(path, "must be a string");
            }
        }
        Rule::Matches(pattern) => match value.as_str() {
            Some(s) if pattern.regex().is_match(s) => {}
            Some(s) => out.error(path, format!("`{s}` does not match {}", pattern.source())),
            None => out.error(path, format!("must be a string matching {}", pattern.source())),
        },
        Rule::OneOf(allowed) => {
            let pattern = format!("^({})$", allowed.join("|"));
            match value.as_str() {
                Some(s) if allowed.contains(&s) => {}
                Some(s) => out.error(path, format!("`{s}` does not match {pattern}")),
                None => out.error(path, format!("must be a string matching {pattern}")),
            }
        }
        Rule::TextList => {
            let ok = value.as_array().is_some_and(|items| items.iter().all(Value::is_string));
            if !ok {
                out.error(path, "must be a list of strings");
            }
        }
    }
}

fn clean_record(fields: &[&[Field]], value: &Value, path: &str, out: &mut Collector) -> Value {
    let Some(record) = value.as_object() else {
        out.error(path, "must be an object");
        return value.clone();
    };
    let known = |key: &str| fields.iter().flat_map(|f| f.iter()).find(|f| f.key == key);

    let mut cleaned = Map::new();
    for (key, v) in record {
        let field_path = format!("{path}.{key}");
        match known(key) {
            Some(field) => {
                check_rule(field.rule, v, &field_path, out);
                cleaned.insert(key.clone(), v.clone());
            }
            None => out.warn(field_path, "unknown key ignored"),
        }
    }
    for field in fields.iter().flat_map(|f| f.iter()) {
        if field.required && !record.contains_key(field.key) {
            out.error(format!("{path}.{}", field.key), "missing required key");
        }
    }
    if record.get("Bus Type").and_then(Value::as_str) == Some("PCI") && !record.contains_key("Device ID") {
        out.error(format!("{path}.Device ID"), "PCI devices require a Device ID");
    }
    Value::Object(cleaned)
}

/// Validates a raw report.
#[must_use]
pub fn validate(report: &Value) -> ValidationOutcome {
    let mut out = Collector::default();
    let Some(root) = report.as_object() else {
        out.error("$", "report must be a JSON object");
        return ValidationOutcome { cleaned: report.clone(), errors: out.errors, warnings: out.warnings };
    };

    let mut cleaned = Map::new();
    for (key, value) in root {
        let Some(category) = SCHEMA.iter().find(|c| c.key == key) else {
            out.warn(key.clone(), "unknown category ignored");
            continue;
        };
        let value = match category.shape {
            Shape::Single => clean_record(category.fields, value, key, &mut out),
            Shape::Map => match value.as_object() {
                Some(devices) => Value::Object(
                    devices
                        .iter()
                        .map(|(name, rec)| {
                            (name.clone(), clean_record(category.fields, rec, &format!("{key}.{name}"), &mut out))
                        })
                        .collect(),
                ),
                None => {
                    out.error(key.clone(), "must map device names to records");
                    value.clone()
                }
            },
        };
        cleaned.insert(key.clone(), value);
    }
    for category in SCHEMA.iter().filter(|c| c.required) {
        if !root.contains_key(category.key) {
            out.error(category.key, "missing required category");
        }
    }
    ValidationOutcome { cleaned: Value::Object(cleaned), errors: out.errors, warnings: out.warnings }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn minimal_report() -> Value {
        json!({
            "Motherboard": {"Name": "Z390 AORUS PRO", "Chipset": "Z390", "Platform": "Desktop"},
            "CPU": {
                "Manufacturer": "Intel",
                "Processor Name": "Intel Core i9-10900K",
                "Codename": "Comet Lake",
                "Core Count": "10",
                "CPU Count": "1",
                "SIMD Features": "SSE, SSE2, SSE3, SSSE3, SSE4.1, SSE4.2, AVX, AVX2"
            },
            "GPU": {
                "AMD Radeon RX 580": {
                    "Manufacturer": "AMD",
                    "Codename": "Polaris 20",
                    "Device ID": "1002-67DF",
                    "Device Type": "Discrete GPU",
                    "Bus Type": "PCI",
                    "PCI Path": "PciRoot(0x0)/Pci(0x1,0x0)/Pci(0x0,0x0)",
                    "ACPI Path": "\\_SB.PCI0.PEG0.PEGP"
                }
            }
        })
    }

    #[test]
    fn valid_report_passes_unchanged() {
        let report = minimal_report();
        let outcome = validate(&report);
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.cleaned, report);
        assert_eq!(validate(&outcome.cleaned).cleaned, outcome.cleaned);
    }

    #[test]
    fn rejects_unknown_manufacturer_with_path_and_pattern() {
        let mut report = minimal_report();
        report["CPU"]["Manufacturer"] = json!("Acme");
        let outcome = validate(&report);
        let err = outcome
            .errors
            .iter()
            .find(|e| e.path == "CPU.Manufacturer")
            .expect("manufacturer error");
        assert!(err.to_string().contains("CPU.Manufacturer"));
        assert!(err.message.contains("^(Intel|AMD)$"), "{}", err.message);
    }

    #[test]
    fn bad_device_id_and_missing_keys_are_errors() {
        let mut report = minimal_report();
        report["GPU"]["AMD Radeon RX 580"]["Device ID"] = json!("1002:67df");
        report["CPU"].as_object_mut().unwrap().remove("Core Count");
        let outcome = validate(&report);
        let paths: Vec<_> = outcome.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"GPU.AMD Radeon RX 580.Device ID"));
        assert!(paths.contains(&"CPU.Core Count"));
        assert!(outcome.errors.iter().any(|e| e.message.contains("[0-9A-F]{4}-[0-9A-F]{4}")));
    }

    #[test]
    fn unknown_keys_warn_and_are_dropped() {
        let mut report = minimal_report();
        report["CPU"]["Stepping"] = json!("5");
        report["Firmware Blob"] = json!({});
        let outcome = validate(&report);
        assert!(outcome.is_valid());
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.cleaned["CPU"].get("Stepping").is_none());
        assert!(outcome.cleaned.get("Firmware Blob").is_none());
        assert_eq!(validate(&outcome.cleaned).cleaned, outcome.cleaned);
    }
}
