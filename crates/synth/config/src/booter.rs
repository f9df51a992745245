//! `Booter.Quirks`.

use plist::Dictionary;

use ocforge_hardware::ids::chipset;
use ocforge_hardware::ids::cpu::IntelGen;

use crate::ConfigInput;
use crate::dict::{int, path, set_flags};

fn resizable_bar(input: &ConfigInput<'_>) -> bool {
    input
        .report
        .bios
        .as_ref()
        .and_then(|b| b.resizable_bar.as_deref())
        .is_some_and(|s| s.eq_ignore_ascii_case("enabled"))
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let generation = input.intel_gen();
    let devirtualise = input.is_amd() || chipset::needs_devirtualise_mmio(&input.report.motherboard.chipset);
    let write_unprotector = !devirtualise;
    let rebuild_map = !write_unprotector;
    let newer_firmware = generation.is_some_and(|g| g >= IntelGen::CometLake);

    let quirks = path(config, &["Booter", "Quirks"]);
    set_flags(
        quirks,
        &[
            ("AvoidRuntimeDefrag", true),
            ("DevirtualiseMmio", devirtualise),
            ("EnableSafeModeSlide", true),
            ("EnableWriteUnprotector", write_unprotector),
            ("ProtectUefiServices", newer_firmware),
            ("ProvideCustomSlide", true),
            ("RebuildAppleMemoryMap", rebuild_map),
            ("SetupVirtualMap", !newer_firmware),
            ("SyncRuntimePermissions", rebuild_map),
        ],
    );
    quirks.insert("ResizeAppleGpuBars".into(), int(if resizable_bar(input) { 0 } else { -1 }));
    log::debug!("Booter: DevirtualiseMmio={devirtualise} EnableWriteUnprotector={write_unprotector}");
}
