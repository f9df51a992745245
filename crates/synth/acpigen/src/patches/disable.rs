//! Hiding unsupported PCI devices.
//!
//! Each device gets a `_DSM` that hands macOS a null identity so no driver
//! matches. A discrete GPU that exposes `_OFF` is also powered down.

use std::fmt::Write as _;

use ocforge_acpi::{AcpiPath, ObjectKind};
use ocforge_hardware::compat::DeviceCompat;

use super::{buffer, device_block, dsm, string_buffer};
use crate::context::GenContext;
use crate::lookup::{device, rename_at};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, asl_path, darwin_only_sta, definition_block, external, external_child, indent, scope};
use crate::GenError;

fn null_properties() -> String {
    dsm(&[
        ("class-code", buffer(&[0xFF, 0xFF, 0xFF, 0xFF])),
        ("vendor-id", buffer(&[0xFF, 0xFF, 0x00, 0x00])),
        ("device-id", buffer(&[0xFF, 0xFF, 0x00, 0x00])),
        ("IOName", "\"Null\"".into()),
        ("name", string_buffer("Null")),
        ("compatible", string_buffer("Null")),
    ])
}

/// `_DSM` that answers with a null identity on macOS and `fallback`
/// elsewhere.
fn darwin_dsm(fallback: &str) -> String {
    let full = null_properties();
    let lines: Vec<&str> = full.lines().collect();
    // Drop the method header, its braces, and keep the body.
    let body = lines.get(2..lines.len().saturating_sub(1)).unwrap_or_default().join("\n");
    let mut out = String::from("Method (_DSM, 4, NotSerialized)  // _DSM: Device-Specific Method\n{\n");
    let _ = write!(out, "    If (_OSI (\"Darwin\"))\n    {{\n{}    }}\n\n    Return ({fallback})\n}}\n", indent(&body, 1));
    out
}

fn dgpu_off(gpu: &AcpiPath) -> String {
    let off = format!("{}._OFF", asl_path(gpu));
    let inner = format!(
        "Name (_HID, \"DGPU1000\")  // _HID: Hardware ID\nMethod (_INI, 0, NotSerialized)  // _INI: Initialize\n{{\n    _OFF ()\n}}\n\nMethod (_OFF, 0, NotSerialized)  // _OFF: Power Off\n{{\n    If (CondRefOf ({off}))\n    {{\n        {off} ()\n    }}\n}}\n\n{}",
        darwin_only_sta()
    );
    device_block("DGPU", &inner)
}

fn parse_path(compat: &DeviceCompat) -> Option<AcpiPath> {
    let raw = compat.info.acpi_path.as_deref()?;
    match raw.parse::<AcpiPath>() {
        Ok(path) if path.depth() > 0 => Some(path),
        _ => {
            log::warn!("{}: unusable ACPI path {raw}", compat.name);
            None
        }
    }
}

pub(super) fn disable_unsupported_devices(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut result = PatchResult::default();
    let mut externals = Vec::new();
    let mut body = String::new();
    let mut dgpu: Option<AcpiPath> = None;

    for compat in ctx.disabled {
        let Some(path) = parse_path(compat) else { continue };
        let Some(dev) = device(ctx, &path) else {
            log::warn!("{}: {path} is not in the firmware tables", compat.name);
            continue;
        };
        let Some(table) = ctx.tables.get(&dev.table) else { continue };
        externals.push(external(&path, "DeviceObj"));

        let fallback = match table.child(&path, "_DSM").filter(|d| d.kind == ObjectKind::Method) {
            Some(existing) => {
                let short = path.last().map(|s| s.to_string()).unwrap_or_default();
                result.patch.push(rename_at(ctx, &dev.table, existing.line, b"_DSM", b"XDSM", format!("{short} _DSM to XDSM Rename"))?);
                externals.push(external_child(&path, "XDSM", "MethodObj"));
                "XDSM (Arg0, Arg1, Arg2, Arg3)".to_string()
            }
            None => "Buffer (One)\n    {\n         0x00\n    }".to_string(),
        };
        log::info!("hiding {} ({path}) from macOS", compat.name);
        body.push_str(&scope(&path, &darwin_dsm(&fallback)));

        if compat.category == "GPU" && dgpu.is_none() && table.child(&path, "_OFF").is_some() {
            externals.push(external_child(&path, "_OFF", "MethodObj"));
            dgpu = Some(path);
        }
    }

    if body.is_empty() {
        return Ok(None);
    }
    if let Some(gpu) = &dgpu {
        log::info!("powering off {gpu} on macOS");
        body.push_str(&scope(&AcpiPath::root(), &dgpu_off(gpu)));
    }
    result.ssdts.push(Ssdt::new(
        "SSDT-Disable_Devices",
        "Hides unsupported devices from macOS",
        definition_block("DDEV", &externals, &body),
    ));
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use ocforge_acpi::fixture;
    use ocforge_acpi::AcpiTables;
    use ocforge_hardware::report::DeviceInfo;

    use super::*;
    use crate::tests_support::{laptop_report, report};
    use ocforge_core::DarwinVersion;

    fn compat(category: &'static str, path: &str) -> DeviceCompat {
        DeviceCompat {
            category,
            name: format!("{category} device"),
            info: DeviceInfo { acpi_path: Some(path.to_string()), ..DeviceInfo::default() },
            native: None,
            extended: None,
        }
    }

    fn tables() -> AcpiTables {
        AcpiTables::from_tables(vec![fixture::table(
            "DSDT",
            b"DSDT",
            &[
                ("Scope (_SB.PCI0.PEG0)", &[0x10, 0x40]),
                ("{", &[]),
                ("    Device (PEGP)", &[0x5B, 0x82, 0x40, b'P', b'E', b'G', b'P']),
                ("    {", &[]),
                ("        Method (_DSM, 4, Serialized)", &[0x14, 0x10, b'_', b'D', b'S', b'M', 0x0C]),
                ("        {", &[]),
                ("        }", &[]),
                ("        Method (_OFF, 0, Serialized)", &[0x14, 0x10, b'_', b'O', b'F', b'F', 0x08]),
                ("        {", &[]),
                ("        }", &[]),
                ("    }", &[]),
                ("}", &[]),
                ("Scope (_SB.PCI0.RP05)", &[0x10, 0x20]),
                ("{", &[]),
                ("    Device (PXSX)", &[0x5B, 0x82, 0x20, b'P', b'X', b'S', b'X']),
                ("    {", &[]),
                ("    }", &[]),
                ("}", &[]),
            ],
        )])
    }

    #[test]
    fn devices_get_a_null_identity_and_the_gpu_is_powered_off() {
        let tables = tables();
        let report = laptop_report();
        let disabled = vec![
            compat("GPU", "\\_SB.PCI0.PEG0.PEGP"),
            compat("Storage", "\\_SB.PCI0.RP05.PXSX"),
            compat("Network", "\\_SB.PCI0.RP09.PXSX"),
        ];
        let ctx = GenContext::new(&tables, &report, DarwinVersion::new(23, 0, 0), &disabled);
        let result = disable_unsupported_devices(&ctx).unwrap().unwrap();

        assert_eq!(result.patch.len(), 1);
        assert_eq!(result.patch[0].comment, "PEGP _DSM to XDSM Rename");
        let src = &result.ssdts[0].source;
        assert!(src.contains("External (\\_SB.PCI0.PEG0.PEGP.XDSM, MethodObj)"));
        assert!(src.contains("Return (XDSM (Arg0, Arg1, Arg2, Arg3))"));
        assert!(src.contains("Scope (\\_SB.PCI0.RP05.PXSX)"));
        assert!(!src.contains("RP09"));
        assert_eq!(src.matches("\"class-code\"").count(), 2);
        assert!(src.contains("\"DGPU1000\""));
        assert!(src.contains("\\_SB.PCI0.PEG0.PEGP._OFF ()"));
    }

    #[test]
    fn nothing_disabled_means_nothing_emitted() {
        let tables = tables();
        let report = report("Laptop", "Intel", "Kaby Lake", "HM175");
        let ctx = GenContext::new(&tables, &report, DarwinVersion::new(23, 0, 0), &[]);
        assert!(disable_unsupported_devices(&ctx).unwrap().is_none());
    }
}
