//! Hardware rules that request kexts.
//!
//! Each rule reads the report and names the kexts it wants. The names go
//! through [`KextSelection::check_kext`] in rule order, so a later rule can
//! evict an earlier pick from the same conflict group.

use ocforge_core::DarwinVersion;
use ocforge_hardware::compat::DeviceCompat;
use ocforge_hardware::ids::cpu::{self, IntelGen};
use ocforge_hardware::ids::network::{self, Adapter};
use ocforge_hardware::ids::{audio, storage};
use ocforge_hardware::report::{DeviceRecord, vendor};
use ocforge_hardware::{CpuVendor, DeviceId, HardwareReport, SimdFeatures};

use crate::emit::BlockEntry;
use crate::resolve::{KextSelection, SkippedKext};

/// Intel's USB vendor id, used by its Bluetooth radios.
const INTEL_USB: u16 = 0x8087;
/// Broadcom Bluetooth USB vendors (Broadcom, and Foxconn/Azurewave/Lite-On rebrands).
const BROADCOM_USB: &[u16] = &[0x0A5C, 0x0489, 0x13D3, 0x04CA, 0x0930];
/// Intel SATA controllers without a native AHCI personality.
const UNSUPPORTED_SATA: &[u16] = &[0x9DD3, 0x02D3, 0x06D3, 0x34D3, 0xA0D3, 0x43D2];

/// First Darwin major without the Wi-Fi stack older drivers rely on.
const SKYWALK: u32 = 23;

/// Build inputs the rules read besides the report.
#[derive(Debug, Clone, Copy)]
pub struct SelectOptions<'a> {
    /// Target macOS.
    pub target: DarwinVersion,
    /// Select kexts even when the target is outside their window.
    pub allow_unsupported: bool,
    /// Root patches from the legacy patcher will be applied.
    pub needs_legacy_patcher: bool,
    /// The CPU cores need TSC synchronisation.
    pub tsc_sync: bool,
    /// A custom CPU name is shown in About This Mac.
    pub custom_cpu_name: bool,
    /// Devices hidden from macOS.
    pub disabled: &'a [DeviceCompat],
}

/// Result of running the rules.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Chosen kexts.
    pub selected: KextSelection,
    /// Requests that could not be honoured.
    pub skipped: Vec<SkippedKext>,
    /// `Kernel.Block` entries the selection needs.
    pub block_entries: Vec<BlockEntry>,
}

struct Facts<'a> {
    report: &'a HardwareReport,
    opts: &'a SelectOptions<'a>,
}

impl Facts<'_> {
    fn major(&self) -> u32 {
        self.opts.target.major
    }

    fn kept(&self, name: &str) -> bool {
        !self.opts.disabled.iter().any(|d| d.name == name)
    }

    fn is_amd(&self) -> bool {
        self.report.cpu.manufacturer == CpuVendor::Amd
    }

    fn intel_gen(&self) -> Option<IntelGen> {
        if self.is_amd() { None } else { IntelGen::from_codename(&self.report.cpu.codename) }
    }

    fn adapters(&self) -> Vec<Adapter> {
        self.report
            .network
            .iter()
            .filter(|(name, _)| self.kept(name))
            .filter_map(|(_, r)| r.info.device_id)
            .filter_map(network::classify)
            .collect()
    }

    fn ids<'b>(&self, map: impl Iterator<Item = (&'b str, &'b DeviceRecord)>) -> Vec<DeviceId> {
        map.filter(|(name, _)| self.kept(name)).filter_map(|(_, r)| r.info.device_id).collect()
    }
}

type RuleFn = fn(&Facts<'_>, &mut Vec<&'static str>);

/// Named rules, applied in order.
const RULES: &[(&str, RuleFn)] = &[
    ("sensors", sensors),
    ("mce", machine_check),
    ("graphics", graphics),
    ("audio", audio_codec),
    ("wifi", wifi),
    ("bluetooth", bluetooth),
    ("ethernet", ethernet),
    ("storage", storage_controllers),
    ("usb", usb),
    ("input", input),
    ("cpu", cpu_timing),
    ("laptop", laptop),
    ("misc", misc),
];

fn sensors(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.is_amd() {
        if cpu::is_amd_zen(&f.report.cpu.codename) {
            out.push("SMCAMDProcessor");
        }
    } else {
        out.push("SMCProcessor");
        if !f.report.is_laptop() {
            out.push("SMCSuperIO");
        }
    }
    if f.report.motherboard.name.to_ascii_lowercase().contains("dell") {
        out.push("SMCDellSensors");
    }
    let radeon = f.report.discrete_gpus().any(|(name, g)| f.kept(name) && g.vendor() == Some(vendor::AMD));
    if radeon {
        out.push("SMCRadeonSensors");
    }
}

fn machine_check(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.report.cpu.cpu_count > 1 || (f.is_amd() && f.major() >= 21) {
        out.push("AppleMCEReporterDisabler");
    }
}

fn graphics(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    out.push("WhateverGreen");
    if f.is_amd()
        && cpu::is_amd_apu(&f.report.cpu.codename)
        && f.report.integrated_gpu().is_some_and(|(name, _)| f.kept(name))
    {
        out.push("NootedRed");
    } else if f.report.gpu.iter().any(|(name, g)| {
        f.kept(name) && g.codename.as_deref().is_some_and(|c| c.to_ascii_lowercase().contains("navi 22"))
    }) {
        out.push("NootRX");
    }
}

fn audio_codec(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    let known = f
        .report
        .sound
        .iter()
        .filter(|(name, _)| f.kept(name))
        .filter_map(|(_, s)| s.info.device_id)
        .any(|codec| audio::layouts(codec).is_some());
    if known {
        out.push("AppleALC");
    }
}

fn wifi(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    let major = f.major();
    for adapter in f.adapters() {
        match adapter {
            Adapter::IntelWifi => {
                if major <= 24 {
                    out.push("AirportItlwm");
                    if major >= SKYWALK {
                        out.extend(["IOSkywalkFamily", "AMFIPass"]);
                    }
                } else {
                    out.push("itlwm");
                }
            }
            Adapter::BroadcomWifi | Adapter::BroadcomWifiLegacy => {
                out.push("AirportBrcmFixup");
                out.push(if major >= 20 { "AirPortBrcmNIC_Injector" } else { "AirPortBrcm4360_Injector" });
                if major >= SKYWALK {
                    out.extend(["IOSkywalkFamily", "AMFIPass"]);
                }
            }
            Adapter::AtherosWifi if major >= 18 => out.extend(["corecaptureElCap", "IO80211ElCap", "AMFIPass"]),
            _ => {}
        }
    }
}

fn bluetooth(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    let major = f.major();
    for id in f.ids(f.report.bluetooth.iter()) {
        if id.vendor == INTEL_USB {
            out.push("IntelBluetoothFirmware");
            if major >= 21 {
                out.extend(["BlueToolFixup", "IntelBTPatcher"]);
            } else {
                out.push("IntelBluetoothInjector");
            }
        } else if BROADCOM_USB.contains(&id.vendor) {
            out.push(if major >= 19 { "BrcmPatchRAM3" } else { "BrcmPatchRAM2" });
            if major >= 21 {
                out.push("BlueToolFixup");
            } else if major >= 19 {
                out.push("BrcmBluetoothInjector");
            }
        }
    }
}

fn ethernet(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    let wired: Vec<Adapter> = f.adapters().into_iter().filter(|a| !a.is_wireless()).collect();
    for adapter in &wired {
        match adapter {
            Adapter::IntelMausi => out.push("IntelMausi"),
            Adapter::IntelIgb => out.push("AppleIGB"),
            Adapter::IntelIgc if f.major() < 20 => out.push("AppleIGC"),
            Adapter::Realtek8111 => out.push("RealtekRTL8111"),
            Adapter::Realtek8125 => out.push("LucyRTL8125Ethernet"),
            Adapter::Realtek8100 => out.push("RealtekRTL8100"),
            Adapter::AtherosE2200 => out.push("AtherosE2200Ethernet"),
            _ => {}
        }
    }
    if wired.is_empty() {
        out.push("NullEthernet");
    }
}

fn storage_controllers(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    let nvme = f.report.storage_controllers.iter().any(|(name, r)| {
        f.kept(name) && (name.contains("NVM") || r.device_type.as_deref().is_some_and(|t| t.contains("NVM")))
    });
    if nvme {
        out.push("NVMeFix");
    }
    let ids = f.ids(f.report.storage_controllers.iter());
    if ids.iter().any(|id| id.vendor == vendor::INTEL && UNSUPPORTED_SATA.contains(&id.device)) {
        out.push(if f.major() >= 20 { "CtlnaAHCIPort" } else { "SATA-unsupported" });
    }
    let readers = f.ids(f.report.sd_controller.iter().chain(f.report.storage_controllers.iter()));
    if readers.into_iter().any(storage::is_realtek_card_reader) {
        out.extend(["RealtekCardReader", "RealtekCardReaderFriend"]);
    }
}

fn usb(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.ids(f.report.usb_controllers.iter()).into_iter().any(storage::needs_xhci_unsupported) {
        out.push("XHCI-unsupported");
    }
}

fn input(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.report.is_laptop() {
        out.push("VoodooPS2Controller");
    }
    if f.report.has_i2c_input() {
        out.extend(["VoodooI2C", "VoodooI2CHID"]);
    }
    for (name, record) in f.report.input.iter() {
        let kind = record.device_type.as_deref().unwrap_or_default();
        if name.contains("SMBus") || kind.contains("SMBus") {
            out.extend(["VoodooSMBus", "VoodooRMI"]);
        }
        if name.to_ascii_uppercase().contains("ALPS") && f.report.has_i2c_input() {
            out.push("AlpsHID");
        }
    }
}

fn cpu_timing(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.opts.tsc_sync {
        out.push(match (f.is_amd(), f.report.is_laptop()) {
            (false, _) => "CpuTscSync",
            (true, true) => "ForgedInvariant",
            (true, false) => "AmdTscSync",
        });
    }
    if f.intel_gen().is_some_and(|g| g < IntelGen::AlderLake) && f.report.cpu.core_count >= 10 && f.major() >= 22 {
        out.push("CpuTopologyRebuild");
    }
    let simd = f.report.cpu.simd();
    if f.major() >= 22 && !simd.is_empty() && !simd.contains(SimdFeatures::AVX2) {
        out.push("CryptexFixup");
    }
}

fn laptop(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.report.is_laptop() {
        out.extend(["SMCBatteryManager", "ECEnabler", "BrightnessKeys"]);
    }
}

fn misc(f: &Facts<'_>, out: &mut Vec<&'static str>) {
    if f.major() >= SKYWALK || f.opts.custom_cpu_name || f.is_amd() {
        out.push("RestrictEvents");
    }
    if f.opts.needs_legacy_patcher {
        out.push("AMFIPass");
    }
}

/// `Kernel.Block` entry letting the bundled `IOSkywalkFamily` replace the
/// system one.
#[must_use]
pub fn skywalk_block() -> BlockEntry {
    BlockEntry {
        arch: "x86_64".into(),
        comment: "Allow IOSkywalk Downgrade".into(),
        enabled: true,
        identifier: "com.apple.iokit.IOSkywalkFamily".into(),
        max_kernel: String::new(),
        min_kernel: DarwinVersion::major_floor(SKYWALK).to_string(),
        strategy: "Exclude".into(),
    }
}

/// Runs every rule against `report`.
#[must_use]
pub fn select(report: &HardwareReport, opts: &SelectOptions<'_>) -> SelectionOutcome {
    let facts = Facts { report, opts };
    let mut selected = KextSelection::new(opts.target, opts.allow_unsupported);
    for (rule, apply) in RULES {
        let mut names = Vec::new();
        apply(&facts, &mut names);
        if !names.is_empty() {
            log::debug!("rule {rule}: {}", names.join(", "));
        }
        for name in names {
            selected.check_kext(name);
        }
    }

    let mut block_entries = Vec::new();
    if selected.contains("IOSkywalkFamily") {
        block_entries.push(skywalk_block());
    }
    log::info!("{} kext(s) selected: {}", selected.len(), selected.names().join(", "));
    SelectionOutcome { skipped: selected.skipped().to_vec(), selected, block_entries }
}
