//! The key layout every config must have.

use plist::{Dictionary, Value};

use crate::dict::section;

/// Sections and the containers they must hold.
const LAYOUT: &[(&str, &[(&str, Kind)])] = &[
    ("ACPI", &[("Add", Kind::Array), ("Delete", Kind::Array), ("Patch", Kind::Array), ("Quirks", Kind::Dict)]),
    ("Booter", &[("MmioWhitelist", Kind::Array), ("Patch", Kind::Array), ("Quirks", Kind::Dict)]),
    ("DeviceProperties", &[("Add", Kind::Dict), ("Delete", Kind::Dict)]),
    (
        "Kernel",
        &[
            ("Add", Kind::Array),
            ("Block", Kind::Array),
            ("Emulate", Kind::Dict),
            ("Force", Kind::Array),
            ("Patch", Kind::Array),
            ("Quirks", Kind::Dict),
            ("Scheme", Kind::Dict),
        ],
    ),
    (
        "Misc",
        &[
            ("BlessOverride", Kind::Array),
            ("Boot", Kind::Dict),
            ("Debug", Kind::Dict),
            ("Entries", Kind::Array),
            ("Security", Kind::Dict),
            ("Serial", Kind::Dict),
            ("Tools", Kind::Array),
        ],
    ),
    ("NVRAM", &[("Add", Kind::Dict), ("Delete", Kind::Dict)]),
    ("PlatformInfo", &[("Generic", Kind::Dict)]),
    (
        "UEFI",
        &[
            ("APFS", Kind::Dict),
            ("AppleInput", Kind::Dict),
            ("Audio", Kind::Dict),
            ("Drivers", Kind::Array),
            ("Input", Kind::Dict),
            ("Output", Kind::Dict),
            ("ProtocolOverrides", Kind::Dict),
            ("Quirks", Kind::Dict),
            ("ReservedMemory", Kind::Array),
        ],
    ),
];

#[derive(Clone, Copy)]
enum Kind {
    Array,
    Dict,
}

/// Creates every required section and container that is missing or has the
/// wrong type. Existing values of the right type are kept.
pub fn ensure_skeleton(config: &mut Dictionary) {
    for (name, children) in LAYOUT {
        let sec = section(config, name);
        for &(child, kind) in *children {
            let ok = match (kind, sec.get(child)) {
                (Kind::Array, Some(Value::Array(_))) | (Kind::Dict, Some(Value::Dictionary(_))) => true,
                _ => false,
            };
            if !ok {
                let empty = match kind {
                    Kind::Array => Value::Array(Vec::new()),
                    Kind::Dict => Value::Dictionary(Dictionary::new()),
                };
                sec.insert(child.to_string(), empty);
            }
        }
    }
}

/// Top-level sections every config carries.
pub fn sections() -> impl Iterator<Item = &'static str> {
    LAYOUT.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::get;

    #[test]
    fn fills_an_empty_config() {
        let mut config = Dictionary::new();
        ensure_skeleton(&mut config);
        let keys: Vec<&str> = config.keys().map(String::as_str).collect();
        assert_eq!(keys, sections().collect::<Vec<_>>());
        assert!(get(&config, &["UEFI", "Drivers"]).and_then(Value::as_array).is_some());
        assert!(get(&config, &["Kernel", "Emulate"]).and_then(Value::as_dictionary).is_some());
    }

    #[test]
    fn keeps_existing_values_and_replaces_wrong_types() {
        let mut config = Dictionary::new();
        let mut misc = Dictionary::new();
        misc.insert("Tools".into(), Value::Array(vec![Value::String("OpenShell.efi".into())]));
        misc.insert("Boot".into(), Value::Boolean(true));
        config.insert("Misc".into(), Value::Dictionary(misc));
        ensure_skeleton(&mut config);
        assert_eq!(get(&config, &["Misc", "Tools"]).and_then(Value::as_array).map(Vec::len), Some(1));
        assert!(get(&config, &["Misc", "Boot"]).and_then(Value::as_dictionary).is_some());
    }
}
