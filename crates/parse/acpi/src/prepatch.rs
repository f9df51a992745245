//! Fix-ups for firmware DSDTs that iasl cannot disassemble.
//!
//! Some AMD boards ship DSDTs that declare the same method or device twice in
//! one scope. The disassembler refuses them, so one copy is renamed before
//! disassembly. The same rename has to be applied at boot, so every applied
//! fix-up is returned as a [`Patch`] for `ACPI.Patch`.

use crate::bytes::{find_all, hex_to_bytes};
use crate::patch::Patch;

/// A known duplicate-object fix-up.
#[derive(Debug, Clone, Copy)]
pub struct PrePatch {
    /// Description carried into `ACPI.Patch`.
    pub comment: &'static str,
    /// Find bytes, hex.
    pub find: &'static str,
    /// Replace bytes, hex.
    pub replace: &'static str,
}

/// Fix-ups in the order they are tried.
pub const PRE_PATCHES: &[PrePatch] = &[
    PrePatch {
        comment: "GPP7 duplicate _PRW methods",
        find: "47505037085F505257",
        replace: "475050370858505257",
    },
    PrePatch {
        comment: "GPP6 duplicate _PRW methods",
        find: "47505036085F505257",
        replace: "475050360858505257",
    },
    PrePatch {
        comment: "GPP7 duplicate UP00 devices",
        find: "2E4750503755503030",
        replace: "2E4750503755505858",
    },
    PrePatch {
        comment: "GPP1 duplicate PTXH devices",
        find: "2E4750503150545848",
        replace: "2E4750503158545848",
    },
];

/// Applies fix-ups to `dsdt` until `disassembles` reports success.
///
/// A fix-up is only applied when its find bytes occur exactly once. After
/// each applied fix-up the table is handed to `disassembles`; the first
/// success stops the sequence. Returns the applied patches, scoped to `DSDT`.
pub fn prepatch<F>(dsdt: &mut [u8], mut disassembles: F) -> Vec<Patch>
where
    F: FnMut(&[u8]) -> bool,
{
    let mut applied = Vec::new();
    for pre in PRE_PATCHES {
        let (Ok(find), Ok(replace)) = (hex_to_bytes(pre.find), hex_to_bytes(pre.replace)) else {
            continue;
        };
        let hits = find_all(dsdt, &find);
        if hits.len() != 1 {
            continue;
        }
        let at = hits[0];
        dsdt[at..at + find.len()].copy_from_slice(&replace);
        log::info!("applied DSDT pre-patch: {}", pre.comment);
        if let Ok(patch) = Patch::new(pre.comment, find, replace) {
            applied.push(patch.in_table(*b"DSDT"));
        }
        if disassembles(dsdt) {
            break;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_only_unique_sites_and_stops_on_success() {
        let gpp7 = hex_to_bytes(PRE_PATCHES[0].find).unwrap();
        let gpp6 = hex_to_bytes(PRE_PATCHES[1].find).unwrap();
        let up00 = hex_to_bytes(PRE_PATCHES[2].find).unwrap();
        let mut dsdt = [gpp7.clone(), gpp7, gpp6, up00].concat();

        let mut attempts = 0;
        let applied = prepatch(&mut dsdt, |_| {
            attempts += 1;
            attempts == 2
        });
        // GPP7 occurs twice and is skipped; GPP6 then UP00 are applied.
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].comment, "GPP6 duplicate _PRW methods");
        assert_eq!(applied[1].table_signature, Some(*b"DSDT"));
        assert_eq!(attempts, 2);
        assert_eq!(find_all(&dsdt, &hex_to_bytes(PRE_PATCHES[2].replace).unwrap()).len(), 1);
    }
}
