//! Power, wake and backlight patches.

use std::fmt::Write as _;

use ocforge_acpi::{AcpiPath, NameSeg, Patch};
use ocforge_hardware::ids::cpu::IntelGen;

use super::{device_block, dsm, shadow_sta};
use crate::context::GenContext;
use crate::lookup::{get_lpc_name, get_sta_var, has_hid, rename_at};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, darwin_only_sta, darwin_sta, definition_block, external, indent, scope};
use crate::GenError;

/// Wake helpers firmware routes `_PRW` through, in lookup order.
const PRW_HELPERS: &[(&str, &[u8; 4])] = &[("GPRW", b"GPRW"), ("UPRW", b"UPRW")];

/// GPE numbers that wake the machine right after sleep.
const INSTANT_WAKE_GPES: &[u8] = &[0x6D, 0x0D];

fn sb() -> AcpiPath {
    AcpiPath::root().join(NameSeg(*b"_SB_"))
}

/// `_STA` that reports `0x0B` (present, enabled, not shown) on macOS.
fn hidden_sta() -> String {
    darwin_sta("0x0B", "Return (Zero)")
}

pub(super) fn pmc(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if has_hid(ctx, "APP9876") {
        return Ok(None);
    }
    let Some(lpc) = get_lpc_name(ctx, false, false) else {
        log::warn!("no LPC bridge to host PMCR");
        return Ok(None);
    };
    let inner = format!(
        "Name (_HID, EisaId (\"APP9876\"))  // _HID: Hardware ID\n{}Name (_CRS, ResourceTemplate ()  // _CRS: Current Resource Settings\n{{\n    Memory32Fixed (ReadWrite,\n        0xFE000000,         // Address Base\n        0x00010000,         // Address Length\n        )\n}})\n",
        hidden_sta()
    );
    Ok(Some(PatchResult::with_ssdt(Ssdt::new(
        "SSDT-PMC",
        "Native NVRAM on 300-series chipsets",
        definition_block("PMCR", &[external(&lpc, "DeviceObj")], &scope(&lpc, &device_block("PMCR", &inner))),
    ))))
}

/// Backlight `_UID` `WhateverGreen` matches against.
fn backlight_uid(generation: Option<IntelGen>) -> u8 {
    match generation {
        Some(IntelGen::Haswell | IntelGen::Broadwell) => 0x0F,
        Some(IntelGen::Skylake | IntelGen::KabyLake) => 0x10,
        Some(g) if g >= IntelGen::CoffeeLake => 0x13,
        _ => 0x0E,
    }
}

pub(super) fn backlight(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut result = PatchResult::default();
    if !ctx.tables.get_device_paths("PNLF", None).is_empty() {
        log::info!("firmware PNLF found; renaming it to XNLF");
        result.patch.push(Patch::new("PNLF to XNLF", b"PNLF".to_vec(), b"XNLF".to_vec())?.global());
    }
    let uid = backlight_uid(ctx.intel_gen());
    let inner = format!(
        "Name (_HID, EisaId (\"APP0002\"))  // _HID: Hardware ID\nName (_CID, \"backlight\")  // _CID: Compatible ID\nName (_UID, 0x{uid:02X})  // _UID: Unique ID\n{}",
        hidden_sta()
    );
    log::info!("PNLF with _UID {uid:#04x}");
    result.ssdts.push(Ssdt::new(
        "SSDT-PNLF",
        "Backlight control device",
        definition_block("PNLF", &[], &scope(&sb(), &device_block("PNLF", &inner))),
    ));
    Ok(Some(result))
}

pub(super) fn instant_wake(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let Some((name, from, method)) = PRW_HELPERS.iter().find_map(|&(name, from)| {
        ctx.tables.get_method_paths(name, None).into_iter().next().map(|m| (name, from, m))
    }) else {
        log::debug!("no GPRW/UPRW helper; nothing to wrap");
        return Ok(None);
    };
    let parent = method.path.parent().unwrap_or_else(AcpiPath::root);
    let renamed = parent.join(NameSeg(*b"XPRW"));
    let rename = rename_at(ctx, &method.table, method.line, from, b"XPRW", format!("{name} to XPRW"))?;

    let mut checks = String::new();
    for gpe in INSTANT_WAKE_GPES {
        let _ = write!(
            checks,
            "If ((0x{gpe:02X} == Arg0))\n{{\n    Return (Package (0x02)\n    {{\n        0x{gpe:02X},\n        Zero\n    }})\n}}\n\n"
        );
    }
    let inner = format!("If (_OSI (\"Darwin\"))\n{{\n{}}}\n\nReturn (XPRW (Arg0, Arg1))\n", indent(checks.trim_end(), 1));
    let wrapper = format!("Method ({name}, 2, NotSerialized)\n{{\n{}}}\n", indent(&inner, 1));
    let body = if parent.depth() == 0 { wrapper } else { scope(&parent, &wrapper) };
    let mut externals = vec![external(&renamed, "MethodObj")];
    if parent.depth() > 0 {
        externals.push(external(&parent, "DeviceObj"));
    }
    log::info!("{name} wrapped to drop GPE 0x6D/0x0D wake on macOS");
    Ok(Some(PatchResult {
        ssdts: vec![Ssdt::new("SSDT-PRW", "Fix instant wake", definition_block("PRW", &externals, &body))],
        patch: vec![rename],
        ..PatchResult::default()
    }))
}

pub(super) fn usb_reset(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut result = PatchResult::default();
    let mut externals = Vec::new();
    let mut body = String::new();
    for var in get_sta_var(ctx, None, Some("RHUB"), None)? {
        let Some((ext, block)) = shadow_sta(&var, "Zero") else { continue };
        externals.extend(ext);
        body.push_str(&block);
        result.patch.extend(var.patches);
    }
    if body.is_empty() {
        log::debug!("no RHUB devices");
        return Ok(None);
    }
    result.ssdts.push(Ssdt::new("SSDT-RHUB", "Resets USB hubs on macOS", definition_block("RHUB", &externals, &body)));
    Ok(Some(result))
}

pub(super) fn usb_power(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if !ctx.tables.get_device_paths("USBX", None).is_empty() {
        return Ok(None);
    }
    let props = dsm(&[
        ("kUSBSleepPowerSupply", "0x13EC".into()),
        ("kUSBSleepPortCurrentLimit", "0x0834".into()),
        ("kUSBWakePowerSupply", "0x13EC".into()),
        ("kUSBWakePortCurrentLimit", "0x0834".into()),
    ]);
    let inner = format!("Name (_ADR, Zero)  // _ADR: Address\n{props}{}", darwin_only_sta());
    Ok(Some(PatchResult::with_ssdt(Ssdt::new(
        "SSDT-USBX",
        "USB power properties",
        definition_block("USBX", &[], &scope(&sb(), &device_block("USBX", &inner))),
    ))))
}
