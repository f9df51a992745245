//! `UEFI`: APFS, drivers, quirks and reserved memory.

use plist::{Dictionary, Value};

use ocforge_hardware::ids::cpu::IntelGen;

use crate::ConfigInput;
use crate::dict::{dict, int, path, set_flags, string};

/// Drivers every build loads, in load order.
pub const DRIVERS: &[&str] = &["HfsPlus.efi", "OpenRuntime.efi", "OpenCanopy.efi", "ResetNvramEntry.efi"];

fn driver(file: &str) -> Value {
    dict([
        ("Arguments", string("")),
        ("Comment", string("")),
        ("Enabled", Value::Boolean(true)),
        ("LoadEarly", Value::Boolean(false)),
        ("Path", string(file)),
    ])
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    // APFS drivers older than the target's minimum are refused; High Sierra
    // needs the oldest ones accepted.
    let apfs_min = if input.major() < 18 { -1 } else { 0 };
    let apfs = path(config, &["UEFI", "APFS"]);
    set_flags(apfs, &[("EnableJumpstart", true), ("GlobalConnect", false), ("HideVerbose", true), ("JumpstartHotPlug", false)]);
    apfs.insert("MinDate".into(), int(apfs_min));
    apfs.insert("MinVersion".into(), int(apfs_min));

    let uefi = path(config, &["UEFI"]);
    uefi.insert("ConnectDrivers".into(), Value::Boolean(true));
    uefi.insert("Drivers".into(), Value::Array(DRIVERS.iter().map(|d| driver(d)).collect()));
    uefi.insert("ReservedMemory".into(), Value::Array(Vec::new()));

    let flex_ratio = input.intel_gen().is_some_and(|g| (IntelGen::IvyBridge..=IntelGen::Broadwell).contains(&g));
    let quirks = path(config, &["UEFI", "Quirks"]);
    set_flags(
        quirks,
        &[
            ("IgnoreInvalidFlexRatio", flex_ratio),
            ("ReleaseUsbOwnership", true),
            ("RequestBootVarRouting", true),
            ("UnblockFsConnect", input.board_is("HP")),
        ],
    );
    quirks.insert("ResizeGpuBars".into(), int(-1));
}
