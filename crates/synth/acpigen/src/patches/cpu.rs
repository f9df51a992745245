//! Processor patches: plugin-type, MADT id fix, legacy power tables and
//! uncore bridges.

use std::fmt::Write as _;

use ocforge_acpi::madt::{self, MADT_SIGNATURE};
use ocforge_acpi::sdt::fix_checksum;
use ocforge_acpi::{DeleteEntry, NameSeg, ObjectKind};

use super::{dsm, shadow_sta};
use crate::context::GenContext;
use crate::lookup::get_sta_var;
use crate::result::{PatchResult, RawTable};
use crate::ssdt::{Ssdt, darwin_only_sta, definition_block, external, indent, scope};
use crate::GenError;

const PLUGIN_TYPE: &str = "plugin-type";

/// OEM table ids of the firmware power management tables that fight with
/// `plugin-type` and `ssdtPRGen` output.
const CPU_PM_TABLES: &[&str] = &["CpuPm", "Cpu0Ist"];

/// Names macOS trips over on X79/X99 boards.
const UNCORE_BRIDGES: &[&str] = &["UNC0", "UNC1", "UNC2", "UNC3"];

pub(super) fn enable_cpu_power_management(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let processors = ctx.tables.get_processor_paths(None);
    let plugin = dsm(&[(PLUGIN_TYPE, "One".into())]);

    if let Some(first) = processors.iter().find(|p| p.kind == ObjectKind::Processor) {
        log::info!("plugin-type goes on {}", first.path);
        let source = definition_block(
            "CpuPlug",
            &[external(&first.path, "ProcessorObj")],
            &scope(&first.path, &plugin),
        );
        let comment = format!("Sets {PLUGIN_TYPE} to 1 on {}", first.path.last().map(|s| s.to_string()).unwrap_or_default());
        return Ok(Some(PatchResult::with_ssdt(Ssdt::new("SSDT-PLUG", comment, source))));
    }

    // ACPI0007 devices only: rebuild them as legacy processors.
    let Some(parent) = processors.first().and_then(|p| p.path.parent()) else {
        log::debug!("no processors found");
        return Ok(None);
    };
    let mut body = String::new();
    for (i, device) in processors.iter().enumerate() {
        let Some(uid) = ctx.tables.get(&device.table).and_then(|t| t.processor_id(device)) else { continue };
        let proc_id = u8::try_from(uid).or_else(|_| u8::try_from(i)).unwrap_or_default();
        let mut inner = format!("Name (_HID, \"ACPI0007\")  // _HID: Hardware ID\nName (_UID, 0x{uid:02X})  // _UID: Unique ID\n");
        inner.push_str(&darwin_only_sta());
        if i == 0 {
            inner.push_str(&plugin);
        }
        let _ = write!(body, "Processor (CP{i:02X}, 0x{proc_id:02X}, 0x00000510, 0x06)\n{{\n{}}}\n\n", indent(&inner, 1));
    }
    if body.is_empty() {
        return Ok(None);
    }
    let source = definition_block("CpuPlugA", &[], &scope(&parent, body.trim_end()));
    log::info!("rebuilt {} ACPI0007 device(s) as Processor objects", processors.len());
    Ok(Some(PatchResult::with_ssdt(Ssdt::new(
        "SSDT-PLUG-ALT",
        format!("Redefines ACPI0007 devices as Processor objects and sets {PLUGIN_TYPE} to 1"),
        source,
    ))))
}

pub(super) fn fix_apic_processor_id(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let Some(apic) = ctx.tables.with_signature(MADT_SIGNATURE).next() else { return Ok(None) };
    let Some(first) = ctx.tables.get_processor_paths(None).into_iter().next() else { return Ok(None) };
    let Some(uid) = ctx.tables.get(&first.table).and_then(|t| t.processor_id(&first)) else { return Ok(None) };
    let Some((offset, id)) = madt::first_local_apic(apic.raw()) else { return Ok(None) };
    let Ok(uid) = u8::try_from(uid) else {
        log::warn!("first processor id {uid:#x} does not fit the MADT");
        return Ok(None);
    };
    if id == uid {
        log::debug!("MADT already starts at processor id {id:#x}");
        return Ok(None);
    }

    let mut bytes = apic.raw().to_vec();
    bytes[offset] = uid;
    fix_checksum(&mut bytes);
    log::info!("first local APIC id {id:#x} rewritten to {uid:#x}");
    Ok(Some(PatchResult {
        tables: vec![RawTable {
            name: "APIC".into(),
            comment: format!("APIC with the first processor id set to {uid:#04x}"),
            bytes,
        }],
        delete: vec![DeleteEntry::for_table("Drop the original APIC", apic.header())],
        ..PatchResult::default()
    }))
}

pub(super) fn drop_cpu_tables(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let delete: Vec<DeleteEntry> = ctx
        .tables
        .tables()
        .iter()
        .filter_map(|t| {
            let oem = t.header().oem_table_id_str();
            CPU_PM_TABLES
                .contains(&oem.as_str())
                .then(|| DeleteEntry::for_table(format!("Delete {oem}"), t.header()))
        })
        .collect();
    Ok((!delete.is_empty()).then(|| PatchResult { delete, ..PatchResult::default() }))
}

pub(super) fn uncore_bridges(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut result = PatchResult::default();
    let mut externals = Vec::new();
    let mut body = String::new();
    for name in UNCORE_BRIDGES.iter().filter(|n| NameSeg::from_name(n).is_some()) {
        for var in get_sta_var(ctx, None, Some(name), None)? {
            let Some((ext, block)) = shadow_sta(&var, "Zero") else { continue };
            externals.extend(ext);
            body.push_str(&block);
            result.patch.extend(var.patches);
        }
    }
    if body.is_empty() {
        return Ok(None);
    }
    result.ssdts.push(Ssdt::new(
        "SSDT-UNC",
        "Disables uncore bridges on macOS",
        definition_block("UNC", &externals, &body),
    ));
    Ok(Some(result))
}
