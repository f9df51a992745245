//! `_OSI` spoofing.
//!
//! Firmware often enables I2C and brightness paths only for recent Windows.
//! Every `_OSI` call is renamed to `XOSI`, which answers yes to the Windows
//! strings the firmware asks about when running macOS.

use std::fmt::Write as _;

use ocforge_acpi::Patch;

use crate::context::GenContext;
use crate::result::PatchResult;
use crate::ssdt::{Ssdt, definition_block};
use crate::GenError;

/// `_OSI` strings Windows answers to, oldest first.
const WINDOWS_OSI: &[&str] = &[
    "Windows 2000",
    "Windows 2001",
    "Windows 2001 SP1",
    "Windows 2001.1",
    "Windows 2001 SP2",
    "Windows 2001.1 SP1",
    "Windows 2006",
    "Windows 2006 SP1",
    "Windows 2006.1",
    "Windows 2009",
    "Windows 2012",
    "Windows 2013",
    "Windows 2015",
    "Windows 2016",
    "Windows 2017",
    "Windows 2017.2",
    "Windows 2018",
    "Windows 2018.2",
    "Windows 2019",
    "Windows 2020",
    "Windows 2021",
    "Windows 2022",
];

/// Firmware methods whose names collide with the rename.
const COLLIDING: &[(&[u8; 4], &[u8; 4])] = &[(b"OSID", b"XSID"), (b"OSIF", b"XSIF")];

fn referenced_strings(ctx: &GenContext<'_>) -> Vec<&'static str> {
    WINDOWS_OSI
        .iter()
        .copied()
        .filter(|osi| {
            let quoted = format!("\"{osi}\"");
            ctx.tables.tables().iter().any(|t| t.lines().iter().any(|l| l.contains(&quoted)))
        })
        .collect()
}

fn xosi_method(strings: &[&str]) -> String {
    let mut pkg = String::new();
    for (i, s) in strings.iter().enumerate() {
        let sep = if i + 1 == strings.len() { "" } else { "," };
        let _ = writeln!(pkg, "        \"{s}\"{sep}");
    }
    format!(
        "\
Method (XOSI, 1, NotSerialized)
{{
    Local0 = Package (0x{:02X})
    {{
{pkg}    }}
    If (_OSI (\"Darwin\"))
    {{
        Return ((Ones != Match (Local0, MEQ, Arg0, MTR, Zero, Zero)))
    }}
    Else
    {{
        Return (_OSI (Arg0))
    }}
}}
",
        strings.len()
    )
}

pub(super) fn xosi(ctx: &GenContext<'_>) -> Result<Option<PatchResult>, GenError> {
    if let Some(existing) = ctx.tables.get_method_paths("XOSI", None).into_iter().next() {
        return Err(GenError::AlreadyPatched(existing.path.to_string()));
    }
    let strings = referenced_strings(ctx);
    if strings.is_empty() {
        log::debug!("firmware never asks for a Windows _OSI");
        return Ok(None);
    }
    log::info!("XOSI will answer to {} Windows string(s), newest {}", strings.len(), strings[strings.len() - 1]);

    let mut result = PatchResult::default();
    for (from, to) in COLLIDING {
        if ctx.tables.count_occurrences(*from) > 0 {
            let comment = format!("{} to {}", String::from_utf8_lossy(*from), String::from_utf8_lossy(*to));
            result.patch.push(Patch::new(comment, from.to_vec(), to.to_vec())?.global().prerequisite());
        }
    }
    result.patch.push(Patch::new("_OSI to XOSI", b"_OSI".to_vec(), b"XOSI".to_vec())?.global());
    result.ssdts.push(Ssdt::new(
        "SSDT-XOSI",
        "Answers Windows _OSI queries on macOS",
        definition_block("XOSI", &[], &xosi_method(&strings)),
    ));
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use ocforge_acpi::fixture;
    use ocforge_acpi::AcpiTables;

    use super::*;
    use crate::tests_support::{context, laptop_report};

    #[test]
    fn only_referenced_windows_strings_are_listed() {
        let tables = AcpiTables::from_tables(vec![fixture::table(
            "DSDT",
            b"DSDT",
            &[
                ("If (_OSI (\"Windows 2009\"))", &[0xA0, 0x10, b'_', b'O', b'S', b'I']),
                ("If (_OSI (\"Windows 2015\"))", &[0xA0, 0x10, b'_', b'O', b'S', b'I']),
                ("Method (OSID, 0, NotSerialized) {}", &[0x14, 0x06, b'O', b'S', b'I', b'D', 0x00]),
            ],
        )]);
        let report = laptop_report();
        let result = xosi(&context(&tables, &report)).unwrap().unwrap();
        let src = &result.ssdts[0].source;
        assert!(src.contains("Package (0x02)"));
        assert!(src.contains("\"Windows 2009\",\n"));
        assert!(src.contains("\"Windows 2015\"\n"));
        assert!(!src.contains("Windows 2001"));

        let comments: Vec<&str> = result.patch.iter().map(|p| p.comment.as_str()).collect();
        assert_eq!(comments, ["OSID to XSID", "_OSI to XOSI"]);
        assert_eq!(result.patch[0].rank, 0);
        assert!(result.patch.iter().all(|p| p.global));
    }

    #[test]
    fn no_windows_checks_means_nothing_to_do() {
        let tables = AcpiTables::from_tables(vec![fixture::table("DSDT", b"DSDT", &[("Name (X, One)", &[0x08])])]);
        let report = laptop_report();
        assert!(xosi(&context(&tables, &report)).unwrap().is_none());
    }
}
