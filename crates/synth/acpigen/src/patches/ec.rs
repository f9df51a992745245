//! Embedded controller.
//!
//! macOS expects a device named `EC` for `AppleBusPowerController`, and on
//! desktops the firmware EC must not load at all.

use ocforge_acpi::{AcpiPath, NameSeg, Patch};

use super::shadow_sta;
use crate::context::GenContext;
use crate::lookup::{StaVar, get_lpc_name, get_sta_var};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, darwin_only_sta, definition_block, external, fill, indent, scope};
use crate::GenError;

const EC_HID: &str = "PNP0C09";

const FAKE_EC: &str = "\
Device (EC)
{
    Name (_HID, \"ACID0001\")  // _HID: Hardware ID
[[Sta]]}
";

fn replace_all(bytes: &mut [u8], from: &[u8; 4], to: &[u8; 4]) {
    let mut i = 0;
    while i + 4 <= bytes.len() {
        if bytes[i..i + 4] == *from {
            bytes[i..i + 4].copy_from_slice(to);
            i += 4;
        } else {
            i += 1;
        }
    }
}

/// Moves an EC called `EC` out of the way.
///
/// The rename runs before every other patch, so the `_STA` finds that
/// captured the old name are rewritten to match.
fn rename_ec(var: &mut StaVar) -> Option<Patch> {
    const OLD: &[u8; 4] = b"EC__";
    const NEW: &[u8; 4] = b"EC0_";
    if var.device.path.last() != NameSeg::from_name("EC") {
        return None;
    }
    let parent = var.device.path.parent()?;
    var.device.path = parent.join(NameSeg(*NEW));
    for patch in &mut var.patches {
        replace_all(&mut patch.find, OLD, NEW);
        replace_all(&mut patch.replace, OLD, NEW);
    }
    log::info!("renaming the firmware EC to EC0");
    Patch::new("EC to EC0", OLD.to_vec(), NEW.to_vec()).ok().map(|p| p.global().prerequisite())
}

fn fake_ec() -> String {
    let sta = indent(&darwin_only_sta(), 1);
    fill(FAKE_EC, &[("Sta", sta.as_str())])
}

pub(super) fn fake_embedded_controller(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut ecs = get_sta_var(ctx, Some(EC_HID), None, None)?;
    let lpc: Option<AcpiPath> = get_lpc_name(ctx, false, false);
    let mut result = PatchResult::default();
    let mut externals = Vec::new();
    let mut body = String::new();
    let laptop = ctx.is_laptop();

    for var in &mut ecs {
        if laptop {
            if var.trivially_present() {
                continue;
            }
            log::info!("{} reports a conditional _STA; forcing it on", var.device.path);
            if let Some((ext, block)) = shadow_sta(var, "0x0F") {
                externals.extend(ext);
                body.push_str(&block);
                result.patch.append(&mut var.patches);
            }
            continue;
        }
        if let Some(rename) = rename_ec(var) {
            result.patch.push(rename);
        }
        log::info!("disabling {} on macOS", var.device.path);
        if let Some((ext, block)) = shadow_sta(var, "Zero") {
            externals.extend(ext);
            body.push_str(&block);
            result.patch.append(&mut var.patches);
        }
    }

    // Laptops keep their own EC whatever it is called.
    if !laptop {
        match &lpc {
            Some(lpc) => {
                externals.push(external(lpc, "DeviceObj"));
                body.push_str(&scope(lpc, &fake_ec()));
            }
            None => log::warn!("no LPC bridge to host a fake EC"),
        }
    }

    if body.is_empty() {
        return Ok(None);
    }
    result.ssdts.push(Ssdt::new("SSDT-EC", "Fake EC device", definition_block("EC", &externals, &body)));
    // Rename first, then the XSTA renames that depend on it.
    result.patch.sort_by_key(|p| p.rank);
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use ocforge_acpi::fixture;
    use ocforge_acpi::AcpiTables;

    use super::*;
    use crate::tests_support::{context, desktop_report, laptop_report};

    fn ec_named(name: &[u8; 4]) -> AcpiTables {
        let text = String::from_utf8_lossy(name).trim_end_matches('_').to_string();
        let device = format!("        Device ({text})");
        AcpiTables::from_tables(vec![fixture::table(
            "DSDT",
            b"DSDT",
            &[
                ("Scope (_SB.PCI0)", &[0x10, 0x40]),
                ("{", &[]),
                ("    Device (LPCB)", &[0x5B, 0x82, 0x40, b'L', b'P', b'C', b'B']),
                ("    {", &[]),
                (device.as_str(), &[0x5B, 0x82, 0x30, name[0], name[1], name[2], name[3]]),
                ("        {", &[]),
                ("            Name (_HID, EisaId (\"PNP0C09\"))", &[0x08, b'_', b'H', b'I', b'D', 0x0C, 0x41, 0xD0, 0x0C, 0x09]),
                ("            Method (_STA, 0, NotSerialized)", &[0x14, 0x08, b'_', b'S', b'T', b'A', 0x00]),
                ("            {", &[]),
                ("                Return (ECON)", &[0xA4, b'E', b'C', b'O', b'N']),
                ("            }", &[]),
                ("        }", &[]),
                ("    }", &[]),
                ("}", &[]),
            ],
        )])
    }

    #[test]
    fn desktop_ec_is_hidden_and_a_fake_added() {
        let tables = ec_named(b"H_EC");
        let report = desktop_report();
        let result = fake_embedded_controller(&context(&tables, &report)).unwrap().unwrap();
        let src = &result.ssdts[0].source;
        assert!(src.contains("External (\\_SB.PCI0.LPCB.H_EC.XSTA, MethodObj)"));
        assert!(src.contains("Scope (\\_SB.PCI0.LPCB.H_EC)"));
        assert!(src.contains("Return (Zero)"));
        assert!(src.contains("Device (EC)"));
        assert!(src.contains("\"ACID0001\""));
        assert_eq!(result.patch.len(), 1);
        assert_eq!(result.patch[0].comment, "H_EC _STA to XSTA Rename");
    }

    #[test]
    fn an_ec_named_ec_is_renamed_first() {
        let tables = ec_named(b"EC__");
        let report = desktop_report();
        let result = fake_embedded_controller(&context(&tables, &report)).unwrap().unwrap();
        assert_eq!(result.patch.len(), 2);
        let rename = &result.patch[0];
        assert_eq!(rename.comment, "EC to EC0");
        assert!(rename.global);
        assert_eq!(rename.rank, 0);
        assert_eq!(rename.find, b"EC__");

        let sta = &result.patch[1];
        assert!(!sta.find.windows(4).any(|w| w == b"EC__"));
        let src = &result.ssdts[0].source;
        assert!(src.contains("Scope (\\_SB.PCI0.LPCB.EC0)"));
        assert!(src.contains("Device (EC)"));
    }

    #[test]
    fn laptop_keeps_an_ec_called_ec() {
        let tables = ec_named(b"EC__");
        let report = laptop_report();
        let result = fake_embedded_controller(&context(&tables, &report)).unwrap().unwrap();
        let src = &result.ssdts[0].source;
        assert!(!src.contains("Device (EC)"));
        assert!(src.contains("Return (0x0F)"));
        assert!(result.patch.iter().all(|p| !p.global));
    }

    #[test]
    fn laptop_never_gets_a_fake_ec() {
        let tables = ec_named(b"H_EC");
        let report = laptop_report();
        let result = fake_embedded_controller(&context(&tables, &report)).unwrap().unwrap();
        let src = &result.ssdts[0].source;
        assert!(!src.contains("Device (EC)"));
        assert!(!src.contains("ACID0001"));
        assert!(src.contains("Scope (\\_SB.PCI0.LPCB.H_EC)"));
        assert!(src.contains("Return (0x0F)"));
    }
}
