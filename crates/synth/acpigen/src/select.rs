//! Which catalog entries run by default.

use std::collections::BTreeSet;

use ocforge_hardware::ids::chipset;
use ocforge_hardware::ids::cpu::IntelGen;
use ocforge_hardware::ids::network;

use crate::context::GenContext;
use crate::patches;

/// Darwin major where plugin-type replaced `ssdtPRgen` tables on Ivy Bridge.
const IVY_PLUGIN_TYPE: u32 = 21;

fn has_wired_ethernet(ctx: &GenContext<'_>) -> bool {
    ctx.report
        .network
        .iter()
        .filter_map(|(_, r)| r.info.device_id)
        .filter_map(network::classify)
        .any(|adapter| !adapter.is_wireless())
}

fn is_hp_board(ctx: &GenContext<'_>) -> bool {
    let name = ctx.report.motherboard.name.to_ascii_uppercase();
    name.starts_with("HP ") || name.contains("HEWLETT")
}

/// Catalog names selected for this machine.
///
/// Entries that do not apply to the firmware are still selected when the
/// hardware calls for them; their functions return `None` at run time.
#[must_use]
pub fn default_selection(ctx: &GenContext<'_>) -> BTreeSet<String> {
    let generation = ctx.intel_gen();
    let target = ctx.target_major();
    let chipset = ctx.chipset();
    let laptop = ctx.is_laptop();

    let mut picks: Vec<&str> = vec!["APIC", "FakeEC", "PRW", "USBX"];
    let mut pick = |cond: bool, name: &'static str| {
        if cond {
            picks.push(name);
        }
    };

    pick(
        generation.is_some_and(|g| g >= IntelGen::Haswell || (g == IntelGen::IvyBridge && target >= IVY_PLUGIN_TYPE)),
        "PLUG",
    );
    pick(generation.is_some_and(|g| g <= IntelGen::IvyBridge) && target < IVY_PLUGIN_TYPE, "Drop CpuPm");
    pick(generation.is_some_and(|g| g <= IntelGen::IvyBridge), "FixHPET");
    pick(generation.is_some_and(|g| g >= IntelGen::CoffeeLake), "RTCAWAC");
    pick(chipset::is_300_series(chipset), "PMC");
    pick(chipset::is_400_series(chipset), "USB Reset");
    pick(chipset::is_6_or_7_series(chipset), "IMEI");
    pick(chipset::needs_uncore_fix(chipset), "UNC");
    pick(ctx.is_intel() && ctx.is_hedt(), "RTC0");
    pick(ctx.is_intel(), "BUS0");
    pick(ctx.is_intel(), "DMAC");
    pick(ctx.is_intel(), "MCHC");
    pick(laptop, "ALS0");
    pick(laptop && ctx.report.integrated_gpu().is_some(), "PNLF");
    pick(laptop && ctx.report.has_i2c_input(), "XOSI");
    pick(laptop && ctx.report.has_i2c_input(), "GPI0");
    pick(!has_wired_ethernet(ctx), "RMNE");
    pick(!ctx.disabled.is_empty(), "Disable Devices");
    pick(is_hp_board(ctx), "CMOS");

    picks.into_iter().map(String::from).collect()
}

/// Applies user overrides on top of `selection`.
///
/// Names are matched against the catalog ignoring case; unknown names are
/// logged and ignored. Disabling wins over enabling.
pub fn apply_overrides(selection: &mut BTreeSet<String>, enable: &[String], disable: &[String]) {
    for (names, on) in [(enable, true), (disable, false)] {
        for name in names {
            let Some(entry) = patches::find(name) else {
                log::warn!("unknown ACPI patch `{name}` in settings");
                continue;
            };
            if on {
                selection.insert(entry.name.to_string());
            } else {
                selection.remove(entry.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ocforge_acpi::fixture;
    use ocforge_acpi::AcpiTables;
    use ocforge_core::DarwinVersion;

    use super::*;
    use crate::tests_support::{context, desktop_report, laptop_report, report};

    fn empty() -> AcpiTables {
        AcpiTables::from_tables(vec![fixture::table("DSDT", b"DSDT", &[("Name (X, One)", &[0x08])])])
    }

    #[test]
    fn coffee_lake_desktop() {
        let tables = empty();
        let report = desktop_report();
        let picks = default_selection(&context(&tables, &report));
        for name in ["APIC", "FakeEC", "PLUG", "RTCAWAC", "PMC", "BUS0", "DMAC", "MCHC", "RMNE", "USBX", "PRW"] {
            assert!(picks.contains(name), "{name} missing from {picks:?}");
        }
        for name in ["ALS0", "PNLF", "FixHPET", "Drop CpuPm", "Disable Devices", "IMEI"] {
            assert!(!picks.contains(name), "{name} should not be selected");
        }
    }

    #[test]
    fn ivy_bridge_on_older_macos_drops_firmware_power_tables() {
        let tables = empty();
        let report = report("Desktop", "Intel", "Ivy Bridge", "Z77");
        let ctx = GenContext::new(&tables, &report, DarwinVersion::new(20, 0, 0), &[]);
        let picks = default_selection(&ctx);
        assert!(picks.contains("Drop CpuPm"));
        assert!(picks.contains("FixHPET"));
        assert!(picks.contains("IMEI"));
        assert!(!picks.contains("PLUG"));
        assert!(!picks.contains("RTCAWAC"));

        let ctx = GenContext::new(&tables, &report, DarwinVersion::new(21, 0, 0), &[]);
        let picks = default_selection(&ctx);
        assert!(picks.contains("PLUG"));
        assert!(!picks.contains("Drop CpuPm"));
    }

    #[test]
    fn laptops_get_backlight_and_light_sensor() {
        let tables = empty();
        let report = laptop_report();
        let picks = default_selection(&context(&tables, &report));
        assert!(picks.contains("ALS0"));
        assert!(!picks.contains("PMC"));
    }

    #[test]
    fn amd_skips_intel_only_devices() {
        let tables = empty();
        let report = report("Desktop", "AMD", "Zen 3", "X570");
        let picks = default_selection(&context(&tables, &report));
        for name in ["PLUG", "BUS0", "MCHC", "DMAC", "RTCAWAC"] {
            assert!(!picks.contains(name), "{name} should not be selected on AMD");
        }
        assert!(picks.contains("FakeEC"));
    }

    #[test]
    fn overrides_match_case_insensitively_and_disable_wins() {
        let mut picks: BTreeSet<String> = ["FakeEC".to_string()].into();
        apply_overrides(
            &mut picks,
            &["xosi".into(), "nonsense".into(), "fakeec".into()],
            &["FAKEEC".into()],
        );
        assert!(picks.contains("XOSI"));
        assert!(!picks.contains("FakeEC"));
        assert_eq!(picks.len(), 1);
    }
}
