//! Lookups shared by several patch functions.

use std::ops::Range;
use std::sync::LazyLock;

use ocforge_acpi::resource::END_TAG;
use ocforge_acpi::table::parse_integer;
use ocforge_acpi::{AcpiError, AcpiPath, ObjectKind, Patch, PathEntry, bytes};
use regex::Regex;

use crate::GenError;
use crate::context::GenContext;
use crate::ssdt::{asl_path, external_child};

static RETURN_CONST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Return\s*\(\s*([A-Za-z0-9]+)\s*\)\s*$").expect("return pattern is valid"));

/// Names an LPC bridge commonly goes by.
const LPC_NAMES: &[&str] = &["LPCB", "LPC0", "LPC", "SBRG", "PX40"];

/// `_ADR` of the LPC bridge on Intel (`00:1F.0`) and AMD (`00:14.3`).
const LPC_ADDRESSES: &[u64] = &[0x001F_0000, 0x0014_0003];

/// Builds a rename of the 4-byte name `from` found in the AML of `line`.
///
/// The search is anchored at the hex encoding `line` and padded with the
/// shortest context that makes the find unique across every loaded table.
/// When no context is unique, the bare rename comes back disabled with a
/// `(generic, review)` comment so the user can decide whether to apply it.
///
/// # Errors
///
/// Returns [`AcpiError::TableNotFound`] or [`AcpiError::PatternNotFound`].
pub fn rename_at(
    ctx: &GenContext<'_>,
    table: &str,
    line: usize,
    from: &[u8; 4],
    to: &[u8; 4],
    comment: impl Into<String>,
) -> Result<Patch, GenError> {
    let t = ctx.tables.get(table).ok_or_else(|| AcpiError::TableNotFound(table.to_string()))?;
    let block = t.find_next_hex(line).ok_or_else(|| AcpiError::PatternNotFound {
        pattern: bytes::bytes_to_hex(from),
        table: table.to_string(),
        offset: 0,
    })?;
    let anchor = bytes::find_from(&block.bytes, from, 0).map_or(block.offset, |i| block.offset + i);
    let (left, right) = match ctx.tables.get_shortest_unique_pad(table, from, anchor) {
        Ok(pads) => pads,
        Err(AcpiError::NotUnique { .. }) => {
            let comment = format!("{} (generic, review)", comment.into());
            log::warn!("{comment}: no unique context in `{table}`, emitted disabled");
            return Ok(Patch::new(comment, from.to_vec(), to.to_vec())?.disabled());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Patch::padded(comment, &left, from, to, &right)?)
}

/// Declared `_STA` of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaDecl {
    /// `Method` or `Name`.
    pub kind: ObjectKind,
    /// Listing line of the declaration.
    pub line: usize,
}

/// What [`get_sta_var`] learned about one device.
#[derive(Debug, Clone, PartialEq)]
pub struct StaVar {
    /// The device.
    pub device: PathEntry,
    /// Its `_STA`, if declared.
    pub sta: Option<StaDecl>,
    /// The `_STA` body mentions the requested variable.
    pub references_var: bool,
    /// Constant `_STA` result, when the body is a single `Return`.
    pub constant: Option<u64>,
    /// `_STA` to `XSTA` rename; empty when not needed.
    pub patches: Vec<Patch>,
}

impl StaVar {
    /// Returns `true` if `_STA` is renamed by [`StaVar::patches`].
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        !self.patches.is_empty()
    }

    /// `External` for the renamed `XSTA`.
    #[must_use]
    pub fn xsta_external(&self, device: &AcpiPath) -> Option<String> {
        let kind = match self.sta?.kind {
            ObjectKind::Method => "MethodObj",
            _ => "IntObj",
        };
        self.is_renamed().then(|| external_child(device, "XSTA", kind))
    }

    /// ASL expression for the status the firmware reported before the
    /// rename.
    #[must_use]
    pub fn original_status(&self) -> String {
        match self.sta {
            Some(StaDecl { kind: ObjectKind::Method, .. }) if self.is_renamed() => "XSTA ()".into(),
            Some(_) if self.is_renamed() => "XSTA".into(),
            _ => format!("0x{:02X}", self.constant.unwrap_or(0x0F)),
        }
    }

    /// Returns `true` if `_STA` is absent or trivially reports present.
    #[must_use]
    pub fn trivially_present(&self) -> bool {
        self.sta.is_none() || self.constant == Some(0x0F)
    }
}

/// Finds devices by `hid` (or by `name` when no hid is given) and inspects
/// their `_STA`.
///
/// When `_STA` exists and does not mention `var`, a padded `_STA` to `XSTA`
/// rename is prepared.
///
/// # Errors
///
/// Returns [`GenError::AlreadyPatched`] when a device already has an `XSTA`
/// (the firmware was patched before) and propagates rename failures.
pub fn get_sta_var(
    ctx: &GenContext<'_>,
    hid: Option<&str>,
    name: Option<&str>,
    var: Option<&str>,
) -> Result<Vec<StaVar>, GenError> {
    let devices = match (hid, name) {
        (Some(hid), _) => ctx.tables.get_device_paths_with_hid(hid, None),
        (None, Some(name)) => ctx.tables.get_device_paths(name, None),
        (None, None) => Vec::new(),
    };
    let mut out = Vec::with_capacity(devices.len());
    for device in devices {
        let Some(table) = ctx.tables.get(&device.table) else { continue };
        if table.child(&device.path, "XSTA").is_some() {
            return Err(GenError::AlreadyPatched(device.path.to_string()));
        }
        let sta = table
            .child(&device.path, "_STA")
            .filter(|e| matches!(e.kind, ObjectKind::Method | ObjectKind::Name))
            .map(|e| StaDecl { kind: e.kind, line: e.line });

        let (references_var, constant) = match sta {
            Some(StaDecl { kind: ObjectKind::Method, line }) => {
                let body = table.get_scope(line, true);
                let refs = var.is_some_and(|v| body.iter().skip(1).any(|l| l.contains(v)));
                (refs, returns_constant(&body))
            }
            Some(StaDecl { line, .. }) => {
                let entry = table.objects().iter().find(|o| o.line == line);
                (false, entry.and_then(|e| table.name_integer(e)))
            }
            None => (false, None),
        };

        let mut patches = Vec::new();
        if let Some(decl) = sta.filter(|_| !references_var) {
            let short = device.path.last().map(|s| s.to_string()).unwrap_or_default();
            let comment = format!("{short} _STA to XSTA Rename");
            patches.push(rename_at(ctx, &device.table, decl.line, b"_STA", b"XSTA", comment)?);
        }
        log::debug!("{}: _STA {:?}, var {references_var}, constant {constant:?}", device.path, sta.map(|s| s.kind));
        out.push(StaVar { device, sta, references_var, constant, patches });
    }
    Ok(out)
}

/// Value of a method body that is a single `Return (<integer>)`.
#[must_use]
pub fn returns_constant(scope: &[String]) -> Option<u64> {
    let statements: Vec<&str> = scope
        .iter()
        .skip(1)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && *l != "{" && *l != "}")
        .collect();
    match statements.as_slice() {
        [only] => parse_integer(&RETURN_CONST.captures(only)?[1]),
        _ => None,
    }
}

/// Locates the LPC bridge.
///
/// Tries the parent of an embedded controller, then well-known names, then
/// any device at the LPC `_ADR` that declares no `_HID`.
#[must_use]
pub fn get_lpc_name(ctx: &GenContext<'_>, skip_ec: bool, skip_common_names: bool) -> Option<AcpiPath> {
    if !skip_ec {
        if let Some(parent) = ctx.tables.get_device_paths_with_hid("PNP0C09", None).iter().find_map(|ec| ec.path.parent()) {
            log::debug!("LPC found as the parent of an EC: {parent}");
            return Some(parent);
        }
    }
    if !skip_common_names {
        for name in LPC_NAMES {
            if let Some(dev) = ctx.tables.get_device_paths(name, None).into_iter().next() {
                log::debug!("LPC found by name: {}", dev.path);
                return Some(dev.path);
            }
        }
    }
    ctx.tables.tables().iter().find_map(|t| {
        t.objects_of(ObjectKind::Device)
            .find(|d| {
                t.child(&d.path, "_HID").is_none()
                    && t.child(&d.path, "_ADR").and_then(|a| t.name_integer(a)).is_some_and(|a| LPC_ADDRESSES.contains(&a))
            })
            .map(|d| d.path.clone())
    })
}

/// The PCI root bridge (`PNP0A08`, else `PNP0A03`).
#[must_use]
pub fn pci_root(ctx: &GenContext<'_>) -> Option<AcpiPath> {
    ["PNP0A08", "PNP0A03"]
        .iter()
        .find_map(|hid| ctx.tables.get_device_paths_with_hid(hid, None).into_iter().next())
        .map(|e| e.path)
}

/// Returns `true` if any device declares `hid`.
#[must_use]
pub fn has_hid(ctx: &GenContext<'_>, hid: &str) -> bool {
    !ctx.tables.get_device_paths_with_hid(hid, None).is_empty()
}

/// `_ADR` of `device`.
#[must_use]
pub fn address_of(ctx: &GenContext<'_>, device: &PathEntry) -> Option<u64> {
    let table = ctx.tables.get(&device.table)?;
    table.name_integer(table.child(&device.path, "_ADR")?)
}

/// First device below `parent` (any depth) whose `_ADR` is `address`.
#[must_use]
pub fn device_at_address(ctx: &GenContext<'_>, parent: Option<&AcpiPath>, address: u64) -> Option<PathEntry> {
    ctx.tables.tables().iter().find_map(|t| {
        t.objects_of(ObjectKind::Device)
            .filter(|d| parent.is_none_or(|p| d.path.starts_with(p)))
            .find(|d| t.child(&d.path, "_ADR").and_then(|a| t.name_integer(a)) == Some(address))
            .cloned()
    })
}

/// The device at `path` in any table.
#[must_use]
pub fn device(ctx: &GenContext<'_>, path: &AcpiPath) -> Option<PathEntry> {
    ctx.tables.tables().iter().find_map(|t| t.object_at(path, ObjectKind::Device).cloned())
}

/// ASL name for the sibling `name` of `path`.
#[must_use]
pub fn sibling(path: &AcpiPath, name: &str) -> Option<String> {
    let parent = path.parent()?;
    let seg = ocforge_acpi::NameSeg::from_name(name)?;
    Some(asl_path(&parent.join(seg)))
}

fn pkg_length(raw: &[u8], at: usize) -> Option<(usize, usize)> {
    let lead = *raw.get(at)?;
    let follow = usize::from(lead >> 6);
    if follow == 0 {
        return Some((usize::from(lead & 0x3F), 1));
    }
    let mut len = usize::from(lead & 0x0F);
    for i in 0..follow {
        len |= usize::from(*raw.get(at + 1 + i)?) << (4 + 8 * i);
    }
    Some((len, 1 + follow))
}

fn integer_const(raw: &[u8], at: usize) -> Option<(usize, usize)> {
    let le = |n: usize| -> Option<usize> {
        let b = raw.get(at + 1..at + 1 + n)?;
        Some(b.iter().rev().fold(0usize, |acc, &x| (acc << 8) | usize::from(x)))
    };
    match *raw.get(at)? {
        0x00 => Some((0, 1)),
        0x01 => Some((1, 1)),
        0x0A => Some((le(1)?, 2)),
        0x0B => Some((le(2)?, 3)),
        0x0C => Some((le(4)?, 5)),
        _ => None,
    }
}

/// Byte ranges of every resource template buffer inside `span`.
///
/// A candidate is a `Buffer` op whose declared size fits the package and
/// whose data ends with an end tag.
#[must_use]
pub fn resource_templates(raw: &[u8], span: Range<usize>) -> Vec<Range<usize>> {
    const BUFFER_OP: u8 = 0x11;
    let end = span.end.min(raw.len());
    let mut out = Vec::new();
    let mut i = span.start;
    while i < end {
        let header = (raw[i] == BUFFER_OP)
            .then(|| pkg_length(raw, i + 1))
            .flatten()
            .and_then(|(pkg, pkg_used)| integer_const(raw, i + 1 + pkg_used).map(|(size, size_used)| (pkg, pkg_used, size, size_used)));
        if let Some((pkg, pkg_used, size, size_used)) = header {
            let data = i + 1 + pkg_used + size_used;
            let data_end = data + size;
            if size >= 2 && data_end <= end && pkg >= pkg_used + size_used + size && raw[data_end - 2] == END_TAG {
                out.push(data..data_end);
                i = data_end;
                continue;
            }
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use ocforge_acpi::fixture;
    use ocforge_acpi::AcpiTables;

    use super::*;
    use crate::tests_support::{context, desktop_report};

    const EC_LISTING: &[(&str, &[u8])] = &[
        ("Scope (_SB.PCI0)", &[0x10, 0x40]),
        ("{", &[]),
        ("    Device (LPCB)", &[0x5B, 0x82, 0x30, b'L', b'P', b'C', b'B']),
        ("    {", &[]),
        ("        Name (_ADR, 0x001F0000)", &[0x08, b'_', b'A', b'D', b'R', 0x0C, 0x00, 0x00, 0x1F, 0x00]),
        ("        Device (EC0)", &[0x5B, 0x82, 0x20, b'E', b'C', b'0', b'_']),
        ("        {", &[]),
        ("            Name (_HID, EisaId (\"PNP0C09\"))", &[0x08, b'_', b'H', b'I', b'D']),
        ("            Method (_STA, 0, NotSerialized)", &[0x14, 0x0A, b'_', b'S', b'T', b'A', 0x00]),
        ("            {", &[]),
        ("                Return (0x0F)", &[0xA4, 0x0A, 0x0F]),
        ("            }", &[]),
        ("        }", &[]),
        ("    }", &[]),
        ("}", &[]),
    ];

    fn tables() -> AcpiTables {
        AcpiTables::from_tables(vec![fixture::table("DSDT", b"DSDT", EC_LISTING)])
    }

    #[test]
    fn lpc_is_found_three_ways() {
        let t = tables();
        let report = desktop_report();
        let ctx = context(&t, &report);
        let lpc = "\\_SB.PCI0.LPCB".parse().unwrap();
        assert_eq!(get_lpc_name(&ctx, false, false), Some(lpc));
        assert_eq!(get_lpc_name(&ctx, true, false).unwrap().to_string(), "\\_SB.PCI0.LPCB");
        assert_eq!(get_lpc_name(&ctx, true, true).unwrap().to_string(), "\\_SB.PCI0.LPCB");
    }

    #[test]
    fn sta_var_reports_a_trivial_method_and_a_unique_rename() {
        let t = tables();
        let report = desktop_report();
        let ctx = context(&t, &report);
        let vars = get_sta_var(&ctx, Some("PNP0C09"), None, None).unwrap();
        assert_eq!(vars.len(), 1);
        let ec = &vars[0];
        assert_eq!(ec.constant, Some(0x0F));
        assert!(ec.trivially_present());
        assert_eq!(ec.patches.len(), 1);
        let p = &ec.patches[0];
        assert_eq!(t.count_occurrences(&p.find), 1);
        assert_eq!(p.find.len(), p.replace.len());
        assert_eq!(ec.original_status(), "XSTA ()");
    }

    #[test]
    fn sta_var_skips_the_rename_when_the_variable_is_used() {
        let t = AcpiTables::from_tables(vec![fixture::table(
            "DSDT",
            b"DSDT",
            &[
                ("Device (AWAC)", &[0x5B, 0x82, 0x20, b'A', b'W', b'A', b'C']),
                ("{", &[]),
                ("    Name (_HID, \"ACPI000E\")", &[0x08, b'_', b'H', b'I', b'D']),
                ("    Method (_STA, 0, NotSerialized)", &[0x14, 0x0A, b'_', b'S', b'T', b'A', 0x00]),
                ("    {", &[]),
                ("        If ((STAS == Zero)) { Return (0x0F) }", &[0xA0, 0x0A]),
                ("        Return (Zero)", &[0xA4, 0x00]),
                ("    }", &[]),
                ("}", &[]),
            ],
        )]);
        let report = desktop_report();
        let ctx = context(&t, &report);
        let vars = get_sta_var(&ctx, Some("ACPI000E"), None, Some("STAS")).unwrap();
        assert!(vars[0].references_var);
        assert!(vars[0].patches.is_empty());
        assert_eq!(vars[0].constant, None);
    }

    #[test]
    fn existing_xsta_aborts() {
        let t = AcpiTables::from_tables(vec![fixture::table(
            "DSDT",
            b"DSDT",
            &[
                ("Device (EC)", &[0x5B, 0x82, 0x20, b'E', b'C', b'_', b'_']),
                ("{", &[]),
                ("    Name (_HID, EisaId (\"PNP0C09\"))", &[0x08, b'_', b'H', b'I', b'D']),
                ("    Name (XSTA, 0x0F)", &[0x08, b'X', b'S', b'T', b'A', 0x0A, 0x0F]),
                ("}", &[]),
            ],
        )]);
        let report = desktop_report();
        let ctx = context(&t, &report);
        assert!(matches!(get_sta_var(&ctx, Some("PNP0C09"), None, None), Err(GenError::AlreadyPatched(_))));
    }

    #[test]
    fn resource_templates_are_found_inside_a_span() {
        let raw = [0x08, b'_', b'C', b'R', b'S', 0x11, 0x08, 0x0A, 0x05, 0x22, 0x01, 0x09, 0x79, 0x00, 0xFF];
        assert_eq!(resource_templates(&raw, 0..raw.len()), vec![9..14]);
        assert!(resource_templates(&raw[..12], 0..12).is_empty());
    }

    #[test]
    fn single_return_bodies_are_constant() {
        let body: Vec<String> = ["Method (_STA, 0, NotSerialized)", "{", "    Return (0x0B)", "}"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(returns_constant(&body), Some(0x0B));
        let two: Vec<String> = ["Method (_STA)", "{", "Store (One, X)", "Return (X)", "}"].iter().map(ToString::to_string).collect();
        assert_eq!(returns_constant(&two), None);
    }

    #[test]
    fn sta_repeated_across_identical_tables_is_renamed_disabled() {
        let t = AcpiTables::from_tables(vec![
            fixture::table("SSDT-1", b"SSDT", EC_LISTING),
            fixture::table("SSDT-2", b"SSDT", EC_LISTING),
        ]);
        let report = desktop_report();
        let ctx = context(&t, &report);
        let vars = get_sta_var(&ctx, Some("PNP0C09"), None, None).unwrap();
        assert!(!vars.is_empty());
        for var in &vars {
            assert_eq!(var.patches.len(), 1);
            let rename = &var.patches[0];
            assert!(!rename.enabled);
            assert_eq!(rename.find, b"_STA");
            assert_eq!(rename.replace, b"XSTA");
            assert_eq!(rename.comment, "EC0 _STA to XSTA Rename (generic, review)");
        }
    }
}
