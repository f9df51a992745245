//! Companion devices macOS looks for and firmware rarely declares.

use ocforge_acpi::{AcpiPath, NameSeg, ObjectKind, PathEntry};
use ocforge_hardware::ids::chipset;
use ocforge_hardware::ids::cpu::IntelGen;

use super::{buffer, device_block, dsm, io_descriptor, shadow_or_flip, string_buffer};
use crate::context::GenContext;
use crate::lookup::{address_of, device_at_address, get_lpc_name, get_sta_var, has_hid, pci_root};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, darwin_only_sta, definition_block, external, scope};
use crate::GenError;

const SBUS_ADDRESSES: &[u64] = &[0x001F_0003, 0x001F_0004];
const SBUS_NAMES: &[&str] = &["SBUS", "SMBU"];

const IMEI_ADDRESS: u64 = 0x0016_0000;

const GPIO_HIDS: &[&str] = &[
    "INT33C7", "INT3437", "INT344B", "INT3450", "INT3451", "INT345D", "INT34BB", "INT34BC", "INT34C5", "INT34C6",
];

fn sb() -> AcpiPath {
    AcpiPath::root().join(NameSeg(*b"_SB_"))
}

fn single(name: &str, comment: &str, table_id: &str, externals: &[String], body: &str) -> Option<PatchResult> {
    Some(PatchResult::with_ssdt(Ssdt::new(name, comment, definition_block(table_id, externals, body))))
}

pub(super) fn ambient_light_sensor(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if has_hid(ctx, "ACPI0008") {
        log::debug!("firmware already declares an ambient light sensor");
        return Ok(None);
    }
    let inner = format!(
        "Name (_HID, \"ACPI0008\")  // _HID: Hardware ID\nName (_CID, \"smc-als\")  // _CID: Compatible ID\nName (_ALI, 0x012C)  // _ALI: Ambient Light Illuminance\nName (_ALR, Package (0x01)  // _ALR: Ambient Light Response\n{{\n    Package (0x02)\n    {{\n        0x64,\n        0x012C\n    }}\n}})\n{}",
        darwin_only_sta()
    );
    Ok(single("SSDT-ALS0", "Fake ambient light sensor", "ALS0", &[], &scope(&sb(), &device_block("ALS0", &inner))))
}

fn smbus_controller(ctx: &GenContext<'_>) -> Option<PathEntry> {
    SBUS_ADDRESSES
        .iter()
        .find_map(|&adr| device_at_address(ctx, None, adr))
        .or_else(|| SBUS_NAMES.iter().find_map(|n| ctx.tables.get_device_paths(n, None).into_iter().next()))
}

pub(super) fn smbus(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let Some(sbus) = smbus_controller(ctx) else {
        log::debug!("no SMBus controller found");
        return Ok(None);
    };
    if ctx.tables.get(&sbus.table).and_then(|t| t.child(&sbus.path, "BUS0")).is_some() {
        return Ok(None);
    }
    let dvl0 = format!(
        "Name (_ADR, 0x57)  // _ADR: Address\nName (_CID, \"diagsvault\")  // _CID: Compatible ID\n{}",
        dsm(&[("address", "0x57".into())])
    );
    let inner = format!(
        "Name (_CID, \"smbus\")  // _CID: Compatible ID\nName (_ADR, Zero)  // _ADR: Address\n{}{}",
        device_block("DVL0", &dvl0),
        darwin_only_sta()
    );
    log::info!("adding BUS0 under {}", sbus.path);
    Ok(single(
        "SSDT-BUS0",
        "SMBus compatibility device",
        "BUS0",
        &[external(&sbus.path, "DeviceObj")],
        &scope(&sbus.path, &device_block("BUS0", &inner)),
    ))
}

pub(super) fn dma_controller(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if has_hid(ctx, "PNP0200") {
        return Ok(None);
    }
    let Some(lpc) = get_lpc_name(ctx, false, false) else {
        log::warn!("no LPC bridge to host a DMA controller");
        return Ok(None);
    };
    let mut resources: String =
        [(0x00, 0x20), (0x81, 0x11), (0x93, 0x0D), (0xC0, 0x20)].iter().map(|&(min, len)| io_descriptor(min, len)).collect();
    resources.push_str("        DMA (Compatibility, NotBusMaster, Transfer8_16, )\n            {4}\n");
    let inner = format!(
        "Name (_HID, EisaId (\"PNP0200\"))  // _HID: Hardware ID\nName (_CRS, ResourceTemplate ()  // _CRS: Current Resource Settings\n{{\n{}}})\n{}",
        resources.lines().map(|l| format!("{}\n", l.strip_prefix("    ").unwrap_or(l))).collect::<String>(),
        darwin_only_sta()
    );
    Ok(single(
        "SSDT-DMAC",
        "Fake DMA controller",
        "DMAC",
        &[external(&lpc, "DeviceObj")],
        &scope(&lpc, &device_block("DMAC", &inner)),
    ))
}

pub(super) fn gpio(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let mut vars = Vec::new();
    for hid in GPIO_HIDS {
        vars.extend(get_sta_var(ctx, Some(hid), None, Some("GPEN"))?);
    }
    if vars.is_empty() {
        log::debug!("no GPIO controller found");
        return Ok(None);
    }
    let Some((externals, body, patches)) = shadow_or_flip(ctx, &vars, "GPEN", "0x0F") else {
        log::debug!("GPIO controller is always enabled");
        return Ok(None);
    };
    let mut result = PatchResult { patch: patches, ..PatchResult::default() };
    result.ssdts.push(Ssdt::new("SSDT-GPI0", "Enables the GPIO controller", definition_block("GPI0", &externals, &body)));
    Ok(Some(result))
}

/// Device id to fake on mismatched CPU/PCH pairs.
fn imei_device_id(ctx: &GenContext<'_>) -> Option<u16> {
    match ctx.intel_gen()? {
        IntelGen::SandyBridge if chipset::is_7_series(ctx.chipset()) => Some(0x1C3A),
        IntelGen::IvyBridge if chipset::is_6_series(ctx.chipset()) => Some(0x1E3A),
        _ => None,
    }
}

pub(super) fn imei(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let Some(device_id) = imei_device_id(ctx) else {
        log::debug!("CPU and chipset generations match; no IMEI spoof");
        return Ok(None);
    };
    let Some(root) = pci_root(ctx) else { return Ok(None) };
    let [lo, hi] = device_id.to_le_bytes();
    let props = dsm(&[("device-id", buffer(&[lo, hi, 0x00, 0x00]))]);

    let existing = device_at_address(ctx, Some(&root), IMEI_ADDRESS);
    let (externals, body) = match existing {
        Some(dev) => {
            if ctx.tables.get(&dev.table).and_then(|t| t.child(&dev.path, "_DSM")).is_some() {
                log::warn!("{} already has a _DSM; not spoofing its device id", dev.path);
                return Ok(None);
            }
            (vec![external(&dev.path, "DeviceObj")], scope(&dev.path, &props))
        }
        None => {
            let inner = format!("Name (_ADR, 0x00160000)  // _ADR: Address\n{props}");
            (vec![external(&root, "DeviceObj")], scope(&root, &device_block("IMEI", &inner)))
        }
    };
    log::info!("IMEI device id spoofed to {device_id:#06x}");
    Ok(single("SSDT-IMEI", format!("IMEI with device id {device_id:#06X}").as_str(), "IMEI", &externals, &body))
}

pub(super) fn memory_controller(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let Some(root) = pci_root(ctx) else { return Ok(None) };
    let host_bridge = ctx.tables.tables().iter().any(|t| {
        t.objects_of(ObjectKind::Device).any(|d| d.path.parent().as_ref() == Some(&root) && address_of(ctx, d) == Some(0))
    });
    if host_bridge || !ctx.tables.get_device_paths("MCHC", None).is_empty() {
        log::debug!("memory controller already declared");
        return Ok(None);
    }
    let inner = format!("Name (_ADR, Zero)  // _ADR: Address\n{}", darwin_only_sta());
    Ok(single(
        "SSDT-MCHC",
        "Memory controller device",
        "MCHC",
        &[external(&root, "DeviceObj")],
        &scope(&root, &device_block("MCHC", &inner)),
    ))
}

pub(super) fn null_ethernet(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if has_hid(ctx, "NULE0000") {
        return Ok(None);
    }
    let props = dsm(&[
        ("built-in", buffer(&[0x00])),
        ("IOName", "\"ethernet\"".into()),
        ("name", string_buffer("ethernet")),
        ("model", string_buffer("RM-NullEthernet-1001")),
        ("device_type", string_buffer("ethernet")),
    ]);
    let inner = format!(
        "Name (_ADR, Zero)  // _ADR: Address\nName (_HID, \"NULE0000\")  // _HID: Hardware ID\nName (MAC, Buffer (0x06)\n{{\n    0x11, 0x22, 0x33, 0x44, 0x55, 0x66\n}})\n{props}{}",
        darwin_only_sta()
    );
    Ok(single("SSDT-RMNE", "Null ethernet device", "RMNE", &[], &scope(&sb(), &device_block("RMNE", &inner))))
}
