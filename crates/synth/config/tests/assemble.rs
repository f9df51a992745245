//! Whole-config assembly for a Comet Lake desktop with a Radeon card.

use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use rand::SeedableRng;
use rand::rngs::StdRng;

use ocforge_config::dict::get;
use ocforge_config::{ConfigInput, ConfigOptions, assemble, models, read_config, smbios, write_config};
use ocforge_core::{CompileOutcome, DarwinVersion, Disassembly, ExternalTools, ToolError};
use ocforge_hardware::HardwareReport;
use ocforge_kext::KextSelection;

struct Macserial;

impl ExternalTools for Macserial {
    fn compile_asl(&self, _dsl: &Path) -> Result<CompileOutcome, ToolError> {
        Err(ToolError::NotFound("iasl".into()))
    }

    fn disassemble(&self, _tables: &[PathBuf], _scratch: &Path) -> Result<Disassembly, ToolError> {
        Err(ToolError::NotFound("iasl".into()))
    }

    fn generate_serial(&self, _model: &str) -> Result<Vec<(String, String)>, ToolError> {
        Ok(vec![("C02XL0GSJ2PL".into(), "C02037102CDJWNKA8".into())])
    }
}

fn comet_lake_desktop() -> HardwareReport {
    HardwareReport::from_json(
        r#"{
        "Motherboard": {"Name": "ASUS ROG STRIX Z490-E", "Chipset": "Z490", "Platform": "Desktop"},
        "BIOS": {"Firmware Type": "UEFI", "Secure Boot": "Disabled", "Resizable BAR": "Enabled"},
        "CPU": {"Manufacturer": "Intel", "Processor Name": "Intel Core i9-10900K", "Codename": "Comet Lake",
                "Core Count": "10", "CPU Count": "1", "SIMD Features": "SSE4.2, AVX, AVX2"},
        "GPU": {
            "Intel UHD Graphics 630": {"Bus Type": "PCI", "Device ID": "8086-9BC5", "Device Type": "Integrated GPU",
                                       "Manufacturer": "Intel", "PCI Path": "PciRoot(0x0)/Pci(0x2,0x0)"},
            "AMD Radeon RX 6600 XT": {"Bus Type": "PCI", "Device ID": "1002-73FF", "Device Type": "Discrete GPU",
                                      "Manufacturer": "AMD", "Codename": "Navi 23",
                                      "PCI Path": "PciRoot(0x0)/Pci(0x1,0x0)/Pci(0x0,0x0)"}
        },
        "Network": {
            "Realtek RTL8125 2.5GbE": {"Bus Type": "PCI", "Device ID": "10EC-8125",
                                      "PCI Path": "PciRoot(0x0)/Pci(0x1C,0x2)/Pci(0x0,0x0)"}
        },
        "Sound": {
            "Realtek ALC1220": {"Bus Type": "PCI", "Device ID": "10EC-1220"}
        }
    }"#,
    )
    .unwrap()
}

/// A report with only a board and a CPU.
fn bare_report(chipset: &str, platform: &str, cpu: &str, codename: &str) -> HardwareReport {
    HardwareReport::from_json(&format!(
        r#"{{
        "Motherboard": {{"Name": "Test Board {chipset}", "Chipset": "{chipset}", "Platform": "{platform}"}},
        "BIOS": {{"Firmware Type": "UEFI", "Secure Boot": "Disabled"}},
        "CPU": {{"Manufacturer": "Intel", "Processor Name": "{cpu}", "Codename": "{codename}",
                "Core Count": "6", "CPU Count": "1", "SIMD Features": "SSE4.2, AVX, AVX2"}}
    }}"#
    ))
    .unwrap()
}

fn build(target: DarwinVersion) -> (Dictionary, smbios::SmbiosIdentity) {
    build_for(&comet_lake_desktop(), target)
}

fn build_for(report: &HardwareReport, target: DarwinVersion) -> (Dictionary, smbios::SmbiosIdentity) {
    let report = report.clone();
    let mut rng = StdRng::seed_from_u64(2024);
    let model = models::select_model(&report, target);
    let identity = smbios::generate(model, &Macserial, &mut rng);

    let mut kexts = KextSelection::new(target, false);
    for name in ["Lilu", "VirtualSMC", "WhateverGreen", "AppleALC", "LucyRTL8125Ethernet", "RestrictEvents"] {
        kexts.check_kext(name);
    }
    let options = ConfigOptions::default();
    let input = ConfigInput {
        report: &report,
        target,
        disabled: &[],
        kexts: &kexts,
        smbios: &identity,
        amd_patches: None,
        options: &options,
    };
    let mut config = Dictionary::new();
    assemble(&mut config, &input, &mut rng);
    (config, identity)
}

fn str_at<'a>(config: &'a Dictionary, keys: &[&str]) -> &'a str {
    get(config, keys).and_then(Value::as_string).unwrap_or_default()
}

#[test]
fn comet_lake_desktop_on_ventura() {
    let (config, identity) = build(DarwinVersion::new(22, 0, 0));

    assert_eq!(identity.system_product_name, "iMac20,2");
    assert_eq!(str_at(&config, &["PlatformInfo", "Generic", "SystemProductName"]), "iMac20,2");
    assert_eq!(str_at(&config, &["PlatformInfo", "Generic", "SystemSerialNumber"]), "C02XL0GSJ2PL");
    let rom = get(&config, &["PlatformInfo", "Generic", "ROM"]).and_then(Value::as_data).unwrap();
    assert_eq!(rom.len(), 6);
    assert_eq!(str_at(&config, &["Misc", "Security", "SecureBootModel"]), "Default");

    let booter = get(&config, &["Booter", "Quirks"]).and_then(Value::as_dictionary).unwrap();
    assert_eq!(booter.get("DevirtualiseMmio").and_then(Value::as_boolean), Some(true));
    assert_eq!(booter.get("EnableWriteUnprotector").and_then(Value::as_boolean), Some(false));
    assert_eq!(booter.get("ResizeAppleGpuBars").and_then(Value::as_signed_integer), Some(0));

    let cpuid = get(&config, &["Kernel", "Emulate", "Cpuid1Data"]).and_then(Value::as_data).unwrap();
    assert_eq!(&cpuid[..4], &[0x55, 0x06, 0x0A, 0x00]);

    let args = str_at(&config, &["NVRAM", "Add", "7C436110-AB2A-4BBB-A880-FE41995C9F82", "boot-args"]);
    assert!(args.starts_with("-v debug=0x100 keepsyms=1"));
    assert!(args.contains("alcid="), "{args}");
    assert!(!args.contains("agdpmod"), "{args}");

    let ethernet = get(&config, &["DeviceProperties", "Add", "PciRoot(0x0)/Pci(0x1C,0x2)/Pci(0x0,0x0)"]);
    assert!(ethernet.is_some());
}

fn booter_flag(config: &Dictionary, key: &str) -> Option<bool> {
    get(config, &["Booter", "Quirks", key]).and_then(Value::as_boolean)
}

#[test]
fn coffee_lake_on_an_unlisted_chipset_keeps_write_unprotector() {
    let report = bare_report("Z370", "Desktop", "Intel Core i7-8700K", "Coffee Lake");
    let (config, _) = build_for(&report, DarwinVersion::new(22, 0, 0));
    assert_eq!(booter_flag(&config, "DevirtualiseMmio"), Some(false));
    assert_eq!(booter_flag(&config, "EnableWriteUnprotector"), Some(true));
    assert_eq!(booter_flag(&config, "RebuildAppleMemoryMap"), Some(false));
    assert_eq!(booter_flag(&config, "SyncRuntimePermissions"), Some(false));
}

#[test]
fn listed_chipset_devirtualises_mmio() {
    let report = bare_report("Z390", "Desktop", "Intel Core i7-9700K", "Coffee Lake");
    let (config, _) = build_for(&report, DarwinVersion::new(22, 0, 0));
    assert_eq!(booter_flag(&config, "DevirtualiseMmio"), Some(true));
    assert_eq!(booter_flag(&config, "EnableWriteUnprotector"), Some(false));
    assert_eq!(booter_flag(&config, "SyncRuntimePermissions"), Some(true));
}

#[test]
fn comet_lake_laptop_spoofs_cpuid() {
    let report = bare_report("HM470", "Laptop", "Intel Core i7-10750H", "Comet Lake");
    let (config, _) = build_for(&report, DarwinVersion::new(22, 0, 0));
    let cpuid = get(&config, &["Kernel", "Emulate", "Cpuid1Data"]).and_then(Value::as_data).unwrap();
    assert_eq!(&cpuid[..4], &[0x55, 0x06, 0x0A, 0x00]);
}

#[test]
fn secure_boot_is_disabled_from_sonoma() {
    let (config, _) = build(DarwinVersion::new(23, 0, 0));
    assert_eq!(str_at(&config, &["Misc", "Security", "SecureBootModel"]), "Disabled");
}

#[test]
fn nvram_delete_mirrors_add() {
    let (config, _) = build(DarwinVersion::new(23, 0, 0));
    let add = get(&config, &["NVRAM", "Add"]).and_then(Value::as_dictionary).unwrap();
    let delete = get(&config, &["NVRAM", "Delete"]).and_then(Value::as_dictionary).unwrap();
    for (guid, vars) in add {
        let listed: Vec<&str> = delete.get(guid).and_then(Value::as_array).unwrap().iter().filter_map(Value::as_string).collect();
        let added: Vec<&str> = vars.as_dictionary().unwrap().keys().map(String::as_str).collect();
        assert_eq!(listed, added, "{guid}");
    }
}

#[test]
fn written_config_reads_back() {
    let (config, _) = build(DarwinVersion::new(22, 0, 0));
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.plist");
    write_config(&file, &config).unwrap();
    assert_eq!(read_config(&file).unwrap(), config);
}
