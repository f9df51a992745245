//! HPET and legacy IRQ conflicts.
//!
//! macOS wants IRQ 0 and 8 for the HPET, so every other device that claims
//! them (plus 2 and 11) in an IRQ descriptor has the bits cleared by a
//! binary patch, and the HPET gets a `_CRS` that claims them instead.

use ocforge_acpi::resource::{IRQ_NO_FLAGS_TAG, IRQ_TAG, irqs_to_mask, mask_to_irqs};
use ocforge_acpi::{AcpiPath, AcpiTable, ObjectKind, Patch, PathEntry, SmallResource, SmallResourceIter};

use super::shadow_sta;
use crate::context::GenContext;
use crate::lookup::{get_lpc_name, get_sta_var, rename_at, resource_templates};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, darwin_only_sta, definition_block, external, external_child, indent, scope};
use crate::GenError;

const HPET_HID: &str = "PNP0103";

/// IRQs cleared from every device but the HPET.
const TARGET_IRQS: &[u8] = &[0, 2, 8, 11];

/// Byte pairs that may follow an IRQ descriptor: end tag, `Memory32Fixed`
/// and `IO`.
const TERMINATORS: &[[u8; 2]] = &[[0x79, 0x00], [0x86, 0x09], [0x47, 0x01]];

/// How far past the descriptor a terminator is looked for.
const TERMINATOR_WINDOW: usize = 4;

/// Context appended to a shared find so each site stands apart.
const GENERIC_SUFFIX: usize = 8;

const HPET_RESOURCES: &str = "\
ResourceTemplate ()
{
    IRQNoFlags ()
        {0,8,11}
    Memory32Fixed (ReadWrite,
        0xFED00000,         // Address Base
        0x00000400,         // Address Length
        )
}";

/// One IRQ descriptor that claims a target IRQ.
#[derive(Debug, Clone)]
struct IrqSite {
    device: AcpiPath,
    table: String,
    /// Table offset of the descriptor tag.
    offset: usize,
    irqs: Vec<u8>,
    find: Vec<u8>,
    replace: Vec<u8>,
}

fn irq_sites(ctx: &GenContext<'_>, device: &PathEntry) -> Vec<IrqSite> {
    let Some(table) = ctx.tables.get(&device.table) else { return Vec::new() };
    let Some(crs) = table.child(&device.path, "_CRS").filter(|c| matches!(c.kind, ObjectKind::Name | ObjectKind::Method))
    else {
        return Vec::new();
    };
    let Some(span) = table.hex_span(crs.line) else { return Vec::new() };
    let raw = table.raw();
    let target = irqs_to_mask(TARGET_IRQS);

    let mut sites = Vec::new();
    for data in resource_templates(raw, span) {
        for (off, res) in SmallResourceIter::new(&raw[data.clone()]) {
            let SmallResource::Irq { mask, .. } = res else { continue };
            if mask & target == 0 {
                continue;
            }
            let offset = data.start + off;
            let tag = raw[offset];
            if tag != IRQ_NO_FLAGS_TAG && tag != IRQ_TAG {
                continue;
            }
            let desc_end = offset + 1 + usize::from(tag & 0x07);
            let window_end = (desc_end + TERMINATOR_WINDOW).min(raw.len());
            let end = (desc_end..window_end.saturating_sub(1))
                .find(|&i| TERMINATORS.iter().any(|t| raw[i..i + 2] == *t))
                .map_or(desc_end, |i| i + 2);

            let find = raw[offset..end].to_vec();
            let mut replace = find.clone();
            let [lo, hi] = (mask & !target).to_le_bytes();
            replace[1] = lo;
            replace[2] = hi;
            sites.push(IrqSite {
                device: device.path.clone(),
                table: device.table.clone(),
                offset,
                irqs: mask_to_irqs(mask & target),
                find,
                replace,
            });
        }
    }
    sites
}

fn irq_list(irqs: &[u8]) -> String {
    irqs.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Patches for every site, grouped by find pattern.
fn irq_patches(ctx: &GenContext<'_>, sites: &[IrqSite]) -> Vec<Patch> {
    let mut groups: Vec<(&[u8], Vec<&IrqSite>)> = Vec::new();
    for site in sites {
        match groups.iter_mut().find(|(find, _)| *find == site.find.as_slice()) {
            Some((_, members)) => members.push(site),
            None => groups.push((site.find.as_slice(), vec![site])),
        }
    }

    let mut patches = Vec::new();
    for (_, members) in groups {
        if let [site] = members.as_slice() {
            let name = site.device.last().map(|s| s.to_string()).unwrap_or_default();
            let comment = format!("{name} IRQ {} Patch", irq_list(&site.irqs));
            match ctx
                .tables
                .get_shortest_unique_pad(&site.table, &site.find, site.offset)
                .and_then(|(l, r)| Patch::padded(&comment, &l, &site.find, &site.replace, &r))
            {
                Ok(patch) => patches.push(patch),
                Err(e) => log::warn!("{comment}: {e}"),
            }
            continue;
        }
        let total = members.len();
        for (i, site) in members.iter().enumerate() {
            let Some(raw) = ctx.tables.get(&site.table).map(AcpiTable::raw) else { continue };
            let start = site.offset + site.find.len();
            let suffix = &raw[start.min(raw.len())..(start + GENERIC_SUFFIX).min(raw.len())];
            let comment = format!("Generic IRQ Patch {} of {total}", i + 1);
            log::info!("{comment}: {} claims IRQ {}", site.device, irq_list(&site.irqs));
            match Patch::padded(comment, &[], &site.find, &site.replace, suffix) {
                Ok(patch) => patches.push(patch.disabled()),
                Err(e) => log::warn!("{e}"),
            }
        }
    }
    patches
}

fn fake_hpet(ctx: &GenContext<'_>, lpc: &AcpiPath) -> (Vec<String>, String) {
    let name = if ctx.tables.get_device_paths("HPET", None).is_empty() { "HPET" } else { "HPE0" };
    let device = format!(
        "Device ({name})\n{{\n    Name (_HID, EisaId (\"PNP0103\"))  // _HID: Hardware ID\n    Name (_CID, EisaId (\"PNP0C01\"))  // _CID: Compatible ID\n    Name (_CRS, {})  // _CRS: Current Resource Settings\n{}}}\n",
        indent(HPET_RESOURCES, 1).trim(),
        indent(&darwin_only_sta(), 1),
    );
    (vec![external(lpc, "DeviceObj")], scope(lpc, &device))
}

/// `_CRS` and `_STA` wrappers for an existing HPET.
fn wrap_hpet(ctx: &GenContext<'_>, result: &mut PatchResult) -> Result<Option<(Vec<String>, String)>, GenError> {
    let Some(var) = get_sta_var(ctx, Some(HPET_HID), None, None)?.into_iter().next() else { return Ok(None) };
    let path = var.device.path.clone();
    let mut externals = vec![external(&path, "DeviceObj")];
    let mut body = String::new();

    let crs = ctx.tables.get(&var.device.table).and_then(|t| t.child(&path, "_CRS").cloned());
    let fallback = match crs {
        Some(crs) => {
            let comment = format!("{} _CRS to XCRS Rename", path.last().map(|s| s.to_string()).unwrap_or_default());
            result.patch.push(rename_at(ctx, &crs.table, crs.line, b"_CRS", b"XCRS", comment)?);
            if crs.kind == ObjectKind::Method {
                externals.push(external_child(&path, "XCRS", "MethodObj"));
                "XCRS ()"
            } else {
                externals.push(external_child(&path, "XCRS", "BuffObj"));
                "XCRS"
            }
        }
        None => "BUFX",
    };
    let method = format!(
        "Name (BUFX, {HPET_RESOURCES})\nMethod (_CRS, 0, Serialized)  // _CRS: Current Resource Settings\n{{\n    If (_OSI (\"Darwin\"))\n    {{\n        Return (BUFX)\n    }}\n\n    Return ({fallback})\n}}\n"
    );
    body.push_str(&scope(&path, &method));

    if let Some((ext, block)) = var.sta.is_some().then(|| shadow_sta(&var, "0x0F")).flatten() {
        externals.extend(ext);
        body.push_str(&block);
        result.patch.extend(var.patches.iter().cloned());
    }
    Ok(Some((externals, body)))
}

pub(super) fn fix_irq_conflicts(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let hpet: Vec<AcpiPath> = ctx.tables.get_device_paths_with_hid(HPET_HID, None).into_iter().map(|e| e.path).collect();
    let mut result = PatchResult::default();

    let (externals, body) = match wrap_hpet(ctx, &mut result)? {
        Some(wrapped) => wrapped,
        None => {
            let Some(lpc) = get_lpc_name(ctx, false, false) else {
                log::warn!("no HPET and no LPC bridge to host one");
                return Ok(None);
            };
            log::info!("no HPET; adding one under {lpc}");
            fake_hpet(ctx, &lpc)
        }
    };

    let sites: Vec<IrqSite> = ctx
        .tables
        .tables()
        .iter()
        .flat_map(|t| t.objects_of(ObjectKind::Device))
        .filter(|d| !hpet.contains(&d.path))
        .flat_map(|d| irq_sites(ctx, d))
        .collect();
    for site in &sites {
        log::debug!("{} claims IRQ {}", site.device, irq_list(&site.irqs));
    }
    result.patch.extend(irq_patches(ctx, &sites));

    result.ssdts.push(Ssdt::new(
        "SSDT-HPET",
        "HPET with IRQ 0, 8 and 11 and legacy IRQ conflicts removed",
        definition_block("HPET", &externals, &body),
    ));
    Ok(Some(result))
}
