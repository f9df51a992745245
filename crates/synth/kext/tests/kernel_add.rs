//! Selection through emission, over bundles laid out on disk.

use std::collections::HashMap;
use std::path::Path;

use ocforge_core::{DarwinVersion, os};
use ocforge_hardware::HardwareReport;
use ocforge_kext::bundle::write_test_bundle;
use ocforge_kext::{KernelAddEntry, KextId, KextSelection, SelectOptions, SelectionOutcome, discover, emit, select};

fn report(network: &str, extra: &str) -> HardwareReport {
    HardwareReport::from_json(&format!(
        r#"{{
        "Motherboard": {{"Name": "Z490 VISION", "Chipset": "Z490", "Platform": "Desktop"}},
        "CPU": {{"Manufacturer": "Intel", "Processor Name": "Intel Core i5-10400", "Codename": "Comet Lake",
                 "Core Count": "6", "CPU Count": "1", "SIMD Features": "SSE4.2, AVX, AVX2"}},
        "GPU": {{"Intel UHD Graphics 630": {{"Bus Type": "PCI", "Device ID": "8086-9BC8", "Device Type": "Integrated GPU",
                                            "Manufacturer": "Intel", "Codename": "Comet Lake"}}}},
        "Network": {{{network}}}
        {extra}
    }}"#
    ))
    .unwrap()
}

fn run_select(report: &HardwareReport, major: u32, tsc_sync: bool) -> SelectionOutcome {
    let opts = SelectOptions {
        target: DarwinVersion::new(major, 0, 0),
        allow_unsupported: false,
        needs_legacy_patcher: false,
        tsc_sync,
        custom_cpu_name: false,
        disabled: &[],
    };
    select(report, &opts)
}

fn identifier(name: &str) -> String {
    format!("org.ocforge.test.{name}")
}

/// Lays out a bundle for every selected kext, plugins inside their parent.
fn lay_out(selection: &KextSelection, root: &Path) {
    for info in selection.iter() {
        let path = match info.parent {
            Some(parent) => format!("{parent}.kext/Contents/PlugIns/{}.kext", info.name),
            None => format!("{}.kext", info.name),
        };
        let mut libs: Vec<String> = info.requires.iter().map(|r| identifier(r)).collect();
        libs.push("com.apple.kpi.libkern".into());
        let libs: Vec<&str> = libs.iter().map(String::as_str).collect();
        write_test_bundle(root, &path, &identifier(info.name), Some(info.name), &libs).unwrap();
    }
}

fn emitted(outcome: &SelectionOutcome) -> (Vec<KernelAddEntry>, HashMap<String, Vec<String>>) {
    let dir = tempfile::tempdir().unwrap();
    lay_out(&outcome.selected, dir.path());
    let bundles = discover(dir.path()).unwrap();
    let libraries = bundles.iter().map(|b| (b.bundle_path.clone(), b.libraries.clone())).collect();
    (emit(&bundles, &outcome.selected, os::latest_final(), os::lowest()), libraries)
}

fn assert_properties(outcome: &SelectionOutcome) {
    let target = outcome.selected.target();
    let (entries, libraries) = emitted(outcome);
    assert!(!entries.is_empty());

    let ids: Vec<String> = entries.iter().map(|e| identifier(e.comment.as_str())).collect();
    for (i, entry) in entries.iter().enumerate() {
        for lib in &libraries[&entry.bundle_path] {
            if lib.starts_with("org.ocforge.test.") {
                assert!(ids[..i].contains(lib), "{} needs {lib} earlier in {ids:?}", entry.bundle_path);
            }
        }

        let min = DarwinVersion::parse_bound(&entry.min_kernel).unwrap();
        let max = DarwinVersion::parse_bound(&entry.max_kernel).unwrap();
        assert!(target.within(min, max), "{}: {}..{} vs {target}", entry.bundle_path, entry.min_kernel, entry.max_kernel);
    }

    let mut groups: HashMap<&str, usize> = HashMap::new();
    for entry in &entries {
        if let Some(group) = KextId::of(&entry.comment).and_then(|id| id.info().conflict_group) {
            *groups.entry(group).or_default() += 1;
        }
    }
    assert!(groups.values().all(|&n| n == 1), "{groups:?}");
}

#[test]
fn intel_wifi_on_sonoma() {
    let r = report(r#""Intel Wi-Fi 6 AX200": {"Bus Type": "PCI", "Device ID": "8086-2723"}"#, "");
    let outcome = run_select(&r, 23, false);
    for name in ["Lilu", "VirtualSMC", "WhateverGreen", "AirportItlwm", "IOSkywalkFamily", "IO80211FamilyLegacy", "AMFIPass"] {
        assert!(outcome.selected.contains(name), "{name} not in {:?}", outcome.selected.names());
    }
    assert!(!outcome.selected.contains("itlwm"));
    assert_eq!(outcome.block_entries.len(), 1);
    assert_eq!(outcome.block_entries[0].identifier, "com.apple.iokit.IOSkywalkFamily");
    assert_eq!(outcome.block_entries[0].strategy, "Exclude");

    let (entries, _) = emitted(&outcome);
    let itlwm = entries.iter().find(|e| e.bundle_path == "AirportItlwm.kext").unwrap();
    assert!(itlwm.min_kernel.starts_with("23."), "{itlwm:?}");
    assert!(itlwm.max_kernel.starts_with("23."), "{itlwm:?}");
    assert_eq!(itlwm.executable_path, "Contents/MacOS/AirportItlwm");
    assert_eq!(entries[0].bundle_path, "Lilu.kext");
}

#[test]
fn intel_wifi_after_sequoia_falls_back_to_itlwm() {
    let r = report(r#""AX201": {"Bus Type": "PCI", "Device ID": "8086-2723"}"#, "");
    let outcome = run_select(&r, 25, false);
    assert!(outcome.selected.contains("itlwm"));
    assert!(!outcome.selected.contains("AirportItlwm"));
    assert!(outcome.block_entries.is_empty());
}

#[test]
fn emission_properties_hold_across_machines() {
    let machines = [
        (report(r#""AX200": {"Bus Type": "PCI", "Device ID": "8086-2723"}"#, ""), 23, true),
        (report(r#""BCM94360": {"Bus Type": "PCI", "Device ID": "14E4-43A0"}"#, ""), 19, false),
        (report(r#""BCM94360": {"Bus Type": "PCI", "Device ID": "14E4-43A0"}"#, ""), 24, true),
        (
            report(
                r#""RTL8125": {"Bus Type": "PCI", "Device ID": "10EC-8125"}"#,
                r#", "Sound": {"ALC897": {"Bus Type": "PCI", "Device ID": "10EC-0897"}},
                   "Storage Controllers": {"NVMe Controller": {"Bus Type": "PCI", "Device ID": "144D-A808"}},
                   "Bluetooth": {"Intel Bluetooth": {"Bus Type": "USB", "Device ID": "8087-0029"}}"#,
            ),
            22,
            false,
        ),
    ];
    for (r, major, tsc) in &machines {
        assert_properties(&run_select(r, *major, *tsc));
    }
}
