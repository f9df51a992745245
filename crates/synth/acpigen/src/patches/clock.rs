//! RTC and AWAC clock patches.

use ocforge_acpi::{ObjectKind, Patch, PathEntry, SmallResource, SmallResourceIter};

use super::{flip_var, io_descriptor, shadow_sta};
use crate::context::GenContext;
use crate::lookup::{StaVar, get_lpc_name, get_sta_var, resource_templates};
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, darwin_only_sta, definition_block, external, fill, indent, scope};
use crate::GenError;

const AWAC_HID: &str = "ACPI000E";
const RTC_HID: &str = "PNP0B00";
const STAS: &str = "STAS";

const RTC_DEVICE: &str = "\
Device ([[Name]])
{
    Name (_HID, EisaId (\"PNP0B00\"))  // _HID: Hardware ID
    Name (_CRS, ResourceTemplate ()  // _CRS: Current Resource Settings
    {
[[Resources]]    })
[[Sta]]}
";

/// One `IO` descriptor inside a device's `_CRS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoRange {
    /// Table offset of the descriptor tag.
    offset: usize,
    min: u16,
    length: u8,
}

fn rtc_device(name: &str, ranges: &[(u16, u8)], irq: bool) -> String {
    let mut resources = String::new();
    for &(min, length) in ranges {
        resources.push_str(&io_descriptor(min, length));
    }
    if irq {
        resources.push_str("        IRQNoFlags ()\n            {8}\n");
    }
    let sta = indent(&darwin_only_sta(), 1);
    fill(RTC_DEVICE, &[("Name", name), ("Resources", resources.as_str()), ("Sta", sta.as_str())])
}

/// `IO` descriptors of the `_CRS` buffer declared directly by `device`.
fn io_ranges(ctx: &GenContext<'_>, device: &PathEntry) -> Vec<IoRange> {
    let Some(table) = ctx.tables.get(&device.table) else { return Vec::new() };
    let Some(crs) = table.child(&device.path, "_CRS").filter(|c| c.kind == ObjectKind::Name) else {
        return Vec::new();
    };
    let Some(span) = table.hex_span(crs.line) else { return Vec::new() };
    resource_templates(table.raw(), span)
        .into_iter()
        .flat_map(|data| {
            SmallResourceIter::new(&table.raw()[data.clone()])
                .filter_map(move |(off, res)| match res {
                    SmallResource::Io { min, length, .. } => Some(IoRange { offset: data.start + off, min, length }),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Patches that stretch each `IO` range of the RTC over the gap that
/// separates it from the next one.
fn close_io_gaps(ctx: &GenContext<'_>, rtc: &PathEntry) -> Result<Vec<Patch>, GenError> {
    const IO_DESCRIPTOR_LEN: usize = 8;
    const LENGTH_BYTE: usize = 7;
    let Some(table) = ctx.tables.get(&rtc.table) else { return Ok(Vec::new()) };
    let ranges = io_ranges(ctx, rtc);
    let mut patches = Vec::new();
    for pair in ranges.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let end = u32::from(prev.min) + u32::from(prev.length);
        if end >= u32::from(next.min) || prev.min > next.min {
            continue;
        }
        let Ok(length) = u8::try_from(next.min - prev.min) else { continue };
        let Some(find) = table.raw().get(prev.offset..prev.offset + IO_DESCRIPTOR_LEN) else { continue };
        let mut replace = find.to_vec();
        replace[LENGTH_BYTE] = length;
        let (left, right) = ctx.tables.get_shortest_unique_pad(&rtc.table, find, prev.offset)?;
        let comment = format!("RTC IO 0x{:04X} length 0x{:02X} to 0x{length:02X}", prev.min, prev.length);
        log::info!("{comment}");
        patches.push(Patch::padded(comment, &left, find, &replace, &right)?);
    }
    Ok(patches)
}

fn shadow_all(vars: &[StaVar], darwin: &str, externals: &mut Vec<String>, body: &mut String, patches: &mut Vec<Patch>) {
    for var in vars {
        if let Some((ext, block)) = shadow_sta(var, darwin) {
            externals.extend(ext);
            body.push_str(&block);
            patches.extend(var.patches.iter().cloned());
        }
    }
}

pub(super) fn fix_system_clock_awac(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let awac = get_sta_var(ctx, Some(AWAC_HID), None, Some(STAS))?;
    let rtc = get_sta_var(ctx, Some(RTC_HID), None, Some(STAS))?;
    if awac.is_empty() {
        log::debug!("no AWAC clock");
        return Ok(None);
    }

    let mut result = PatchResult::default();
    let mut externals = Vec::new();
    let mut body = String::new();

    if awac.iter().chain(&rtc).any(|v| v.references_var) {
        log::info!("AWAC is gated by {STAS}; flipping it on Darwin");
        let (ext, block) = flip_var(ctx, STAS);
        externals.extend(ext);
        body.push_str(&block);
    } else {
        shadow_all(&awac, "Zero", &mut externals, &mut body, &mut result.patch);
    }

    if rtc.is_empty() {
        match get_lpc_name(ctx, false, false) {
            Some(lpc) => {
                log::info!("no RTC; adding RTC0 under {lpc}");
                externals.push(external(&lpc, "DeviceObj"));
                body.push_str(&scope(&lpc, &rtc_device("RTC0", &[(0x70, 0x08)], true)));
            }
            None => log::warn!("no RTC and no LPC bridge to host one"),
        }
    } else {
        let hidden: Vec<StaVar> = rtc.iter().filter(|v| !v.trivially_present() && !v.references_var).cloned().collect();
        shadow_all(&hidden, "0x0F", &mut externals, &mut body, &mut result.patch);
        for var in &rtc {
            result.patch.extend(close_io_gaps(ctx, &var.device)?);
        }
    }

    if body.is_empty() && result.patch.is_empty() {
        return Ok(None);
    }
    if !body.is_empty() {
        result.ssdts.push(Ssdt::new(
            "SSDT-RTCAWAC",
            "Disables AWAC and enables the legacy RTC on macOS",
            definition_block("RTCAWAC", &externals, &body),
        ));
    }
    Ok(Some(result))
}

/// Hides every firmware RTC and adds `name` under the LPC with `ranges`.
fn replace_rtc(
    ctx: &GenContext<'_>,
    name: &str,
    ssdt: &str,
    comment: &str,
    ranges: &[(u16, u8)],
) -> Result<Option<PatchResult>, GenError> {
    let rtc = get_sta_var(ctx, Some(RTC_HID), None, None)?;
    let Some(lpc) = rtc.first().and_then(|r| r.device.path.parent()).or_else(|| get_lpc_name(ctx, false, false)) else {
        log::warn!("{ssdt}: no LPC bridge found");
        return Ok(None);
    };
    let mut result = PatchResult::default();
    let mut externals = vec![external(&lpc, "DeviceObj")];
    let mut body = String::new();
    shadow_all(&rtc, "Zero", &mut externals, &mut body, &mut result.patch);
    body.push_str(&scope(&lpc, &rtc_device(name, ranges, true)));
    result.ssdts.push(Ssdt::new(ssdt, comment, definition_block(name, &externals, &body)));
    Ok(Some(result))
}

pub(super) fn rtc_range(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    let rtc = ctx.tables.get_device_paths_with_hid(RTC_HID, None);
    let Some(first) = rtc.first() else { return Ok(None) };
    let ranges = io_ranges(ctx, first);
    let covered = |port: u16| ranges.iter().any(|r| r.min <= port && u32::from(port) < u32::from(r.min) + u32::from(r.length));
    if (0x70..0x78).all(covered) {
        log::debug!("RTC already spans 0x70-0x77");
        return Ok(None);
    }
    replace_rtc(ctx, "RTC0", "SSDT-RTC0-RANGE", "RTC with the full 0x70-0x77 range", &[(0x70, 0x02), (0x74, 0x04)])
}

pub(super) fn cmos(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    replace_rtc(ctx, "CMOS", "SSDT-CMOS", "RTC limited to the first CMOS bank", &[(0x70, 0x02), (0x72, 0x02)])
}
