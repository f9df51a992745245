//! The compiled-in kext catalog.
//!
//! Entries are immutable. Per-build state lives in
//! [`KextSelection`](crate::KextSelection), which refers to entries by
//! [`KextId`].

use std::fmt;

use ocforge_core::DarwinVersion;

/// What a kext is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Always loaded.
    Required,
    /// `VirtualSMC` sensor plugins.
    Sensors,
    /// Graphics patching.
    Graphics,
    /// Audio.
    Audio,
    /// Wired networking.
    Ethernet,
    /// Wireless networking.
    Wifi,
    /// Bluetooth.
    Bluetooth,
    /// Storage and card readers.
    Storage,
    /// USB.
    Usb,
    /// Keyboards, trackpads, I2C.
    Input,
    /// CPU power and timing.
    Cpu,
    /// Laptop helpers.
    Laptop,
    /// Everything else.
    Misc,
}

/// Where a kext's release archive comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Download {
    /// Latest GitHub release of `owner/repo`.
    GitHub {
        /// Repository owner.
        owner: &'static str,
        /// Repository name.
        repo: &'static str,
    },
    /// Shipped in the extras archive under this directory name.
    Extra(&'static str),
}

impl Download {
    /// `(product_name, id)` key used by the fetch cache.
    #[must_use]
    pub fn product(self) -> &'static str {
        match self {
            Self::GitHub { repo, .. } => repo,
            Self::Extra(name) => name,
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KextInfo {
    /// Display name; also the bundle stem (`<name>.kext`).
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Category.
    pub category: Category,
    /// Selected on every build.
    pub required: bool,
    /// First supported Darwin major.
    pub min_darwin: u32,
    /// Last supported Darwin major; `None` for no upper bound.
    pub max_darwin: Option<u32>,
    /// Names of kexts this one needs.
    pub requires: &'static [&'static str],
    /// At most one kext per group is selected.
    pub conflict_group: Option<&'static str>,
    /// Bundle this kext ships inside, as a plugin.
    pub parent: Option<&'static str>,
    /// Release source.
    pub download: Download,
}

impl KextInfo {
    /// Lower bound of the support window.
    #[must_use]
    pub const fn min_version(&self) -> DarwinVersion {
        DarwinVersion::major_floor(self.min_darwin)
    }

    /// Upper bound of the support window, `None` when unbounded.
    #[must_use]
    pub fn max_version(&self) -> Option<DarwinVersion> {
        self.max_darwin.map(DarwinVersion::major_ceiling)
    }

    /// Returns `true` if `target` lies inside the support window.
    #[must_use]
    pub fn supports(&self, target: DarwinVersion) -> bool {
        target.within(Some(self.min_version()), self.max_version())
    }
}

/// Index of an entry in [`CATALOG`]. Orders like the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KextId(u16);

impl KextId {
    /// Looks up an entry by name, ignoring case.
    #[must_use]
    pub fn of(name: &str) -> Option<Self> {
        CATALOG
            .iter()
            .position(|k| k.name.eq_ignore_ascii_case(name))
            .and_then(|i| u16::try_from(i).ok())
            .map(Self)
    }

    /// The catalog entry.
    #[must_use]
    pub fn info(self) -> &'static KextInfo {
        &CATALOG[usize::from(self.0)]
    }

    /// Every id, in catalog order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CATALOG.len()).filter_map(|i| u16::try_from(i).ok()).map(Self)
    }
}

impl fmt::Display for KextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Entry lookup by exact or case-folded name.
#[must_use]
pub fn find(name: &str) -> Option<&'static KextInfo> {
    KextId::of(name).map(KextId::info)
}

const fn gh(owner: &'static str, repo: &'static str) -> Download {
    Download::GitHub { owner, repo }
}

const fn kext(
    name: &'static str,
    description: &'static str,
    category: Category,
    window: (u32, Option<u32>),
    requires: &'static [&'static str],
    conflict_group: Option<&'static str>,
    download: Download,
) -> KextInfo {
    KextInfo {
        name,
        description,
        category,
        required: false,
        min_darwin: window.0,
        max_darwin: window.1,
        requires,
        conflict_group,
        parent: None,
        download,
    }
}

const fn required(mut info: KextInfo) -> KextInfo {
    info.required = true;
    info
}

const fn plugin_of(mut info: KextInfo, parent: &'static str) -> KextInfo {
    info.parent = Some(parent);
    info
}

const ANY: (u32, Option<u32>) = (17, None);
const LILU: &[&str] = &["Lilu"];
const SMC: &[&str] = &["Lilu", "VirtualSMC"];

use Category as C;

/// Group names shared by mutually exclusive kexts.
pub mod groups {
    /// Intel Wi-Fi drivers.
    pub const INTEL_WIFI: &str = "IntelWiFi";
    /// Broadcom Bluetooth firmware uploaders.
    pub const BRCM_PATCHRAM: &str = "BrcmPatchRAM";
    /// TSC synchronisation.
    pub const TSC: &str = "TSC";
    /// Intel Bluetooth injectors.
    pub const INTEL_BT: &str = "IntelBT";
    /// Primary graphics patcher.
    pub const GRAPHICS: &str = "Graphics";
    /// AHCI workarounds.
    pub const AHCI: &str = "AHCI";
}

/// Every kext the generator knows about, in load-preference order.
pub const CATALOG: &[KextInfo] = &[
    // Required
    required(kext("Lilu", "Kernel extension patching framework", C::Required, ANY, &[], None, gh("acidanthera", "Lilu"))),
    required(kext("VirtualSMC", "SMC emulator", C::Required, ANY, LILU, None, gh("acidanthera", "VirtualSMC"))),
    // Sensors
    kext("SMCProcessor", "Intel CPU temperature sensors", C::Sensors, ANY, SMC, None, gh("acidanthera", "VirtualSMC")),
    kext("SMCSuperIO", "Fan speed sensors", C::Sensors, ANY, SMC, None, gh("acidanthera", "VirtualSMC")),
    kext("SMCBatteryManager", "Battery status", C::Sensors, ANY, SMC, None, gh("acidanthera", "VirtualSMC")),
    kext("SMCLightSensor", "Ambient light sensor", C::Sensors, ANY, SMC, None, gh("acidanthera", "VirtualSMC")),
    kext("SMCDellSensors", "Dell fan and temperature sensors", C::Sensors, ANY, SMC, None, gh("acidanthera", "VirtualSMC")),
    kext("SMCRadeonSensors", "AMD GPU temperature sensors", C::Sensors, (18, None), SMC, None, gh("ChefKissInc", "SMCRadeonSensors")),
    kext(
        "AMDRyzenCPUPowerManagement",
        "AMD CPU power management",
        C::Sensors,
        (19, None),
        &[],
        None,
        gh("trulyspinach", "SMCAMDProcessor"),
    ),
    kext(
        "SMCAMDProcessor",
        "AMD CPU temperature sensors",
        C::Sensors,
        (19, None),
        &["VirtualSMC", "AMDRyzenCPUPowerManagement"],
        None,
        gh("trulyspinach", "SMCAMDProcessor"),
    ),
    // Graphics
    kext("WhateverGreen", "Graphics patching", C::Graphics, ANY, LILU, Some(groups::GRAPHICS), gh("acidanthera", "WhateverGreen")),
    kext("NootedRed", "AMD Vega iGPU support", C::Graphics, (19, None), LILU, Some(groups::GRAPHICS), gh("ChefKissInc", "NootedRed")),
    kext("NootRX", "AMD Navi 22 support", C::Graphics, (21, None), LILU, Some(groups::GRAPHICS), gh("ChefKissInc", "NootRX")),
    // Audio
    kext("AppleALC", "Native audio for HDA codecs", C::Audio, ANY, LILU, None, gh("acidanthera", "AppleALC")),
    // Ethernet
    kext("IntelMausi", "Intel client Ethernet", C::Ethernet, ANY, &[], None, gh("acidanthera", "IntelMausi")),
    kext("AppleIGB", "Intel I211/82576 Ethernet", C::Ethernet, (17, Some(23)), &[], None, gh("donatengit", "AppleIGB")),
    kext("AppleIGC", "Intel I225/I226 Ethernet", C::Ethernet, (17, Some(19)), &[], None, gh("SongXiaoXi", "AppleIGC")),
    kext("RealtekRTL8111", "Realtek RTL8111 Ethernet", C::Ethernet, ANY, &[], None, gh("Mieze", "RTL8111_driver_for_OS_X")),
    kext("LucyRTL8125Ethernet", "Realtek RTL8125 2.5GbE", C::Ethernet, ANY, &[], None, gh("Mieze", "LucyRTL8125Ethernet")),
    kext("RealtekRTL8100", "Realtek RTL810x Ethernet", C::Ethernet, ANY, &[], None, gh("Mieze", "RealtekRTL8100")),
    kext("AtherosE2200Ethernet", "Atheros/Killer E2200 Ethernet", C::Ethernet, ANY, &[], None, gh("Mieze", "AtherosE2200Ethernet")),
    kext("NullEthernet", "Fake built-in Ethernet for iServices", C::Ethernet, ANY, &[], None, Download::Extra("NullEthernet")),
    // Wi-Fi
    kext("AirportItlwm", "Intel Wi-Fi as AirPort", C::Wifi, (18, Some(24)), &[], Some(groups::INTEL_WIFI), gh("OpenIntelWireless", "itlwm")),
    kext("itlwm", "Intel Wi-Fi as Ethernet", C::Wifi, ANY, &[], Some(groups::INTEL_WIFI), gh("OpenIntelWireless", "itlwm")),
    kext("AirportBrcmFixup", "Broadcom Wi-Fi fixes", C::Wifi, ANY, LILU, None, gh("acidanthera", "AirportBrcmFixup")),
    plugin_of(
        kext(
            "AirPortBrcm4360_Injector",
            "BCM4360 family injector",
            C::Wifi,
            (17, Some(19)),
            &["AirportBrcmFixup"],
            None,
            gh("acidanthera", "AirportBrcmFixup"),
        ),
        "AirportBrcmFixup",
    ),
    plugin_of(
        kext(
            "AirPortBrcmNIC_Injector",
            "BCM4360 family injector",
            C::Wifi,
            (20, None),
            &["AirportBrcmFixup"],
            None,
            gh("acidanthera", "AirportBrcmFixup"),
        ),
        "AirportBrcmFixup",
    ),
    kext("IO80211FamilyLegacy", "Pre-Sonoma Wi-Fi stack", C::Wifi, (23, None), &[], None, Download::Extra("IO80211FamilyLegacy")),
    kext(
        "IOSkywalkFamily",
        "Pre-Sonoma Skywalk stack",
        C::Wifi,
        (23, None),
        &["IO80211FamilyLegacy"],
        None,
        Download::Extra("IOSkywalkFamily"),
    ),
    kext("corecaptureElCap", "Atheros corecapture", C::Wifi, (18, Some(22)), &[], None, Download::Extra("corecaptureElCap")),
    kext(
        "IO80211ElCap",
        "Atheros Wi-Fi stack",
        C::Wifi,
        (18, Some(22)),
        &["corecaptureElCap"],
        None,
        Download::Extra("IO80211ElCap"),
    ),
    // Bluetooth
    kext("BlueToolFixup", "Bluetooth stack fixes for Monterey and newer", C::Bluetooth, (21, None), LILU, None, gh("acidanthera", "BrcmPatchRAM")),
    kext("BrcmFirmwareData", "Broadcom Bluetooth firmware", C::Bluetooth, ANY, &[], None, gh("acidanthera", "BrcmPatchRAM")),
    kext(
        "BrcmPatchRAM2",
        "Broadcom Bluetooth firmware uploader",
        C::Bluetooth,
        (17, Some(18)),
        &["BrcmFirmwareData"],
        Some(groups::BRCM_PATCHRAM),
        gh("acidanthera", "BrcmPatchRAM"),
    ),
    kext(
        "BrcmPatchRAM3",
        "Broadcom Bluetooth firmware uploader",
        C::Bluetooth,
        (19, None),
        &["BrcmFirmwareData"],
        Some(groups::BRCM_PATCHRAM),
        gh("acidanthera", "BrcmPatchRAM"),
    ),
    kext("BrcmBluetoothInjector", "Broadcom Bluetooth injector", C::Bluetooth, (19, Some(20)), &[], None, gh("acidanthera", "BrcmPatchRAM")),
    kext(
        "IntelBluetoothFirmware",
        "Intel Bluetooth firmware uploader",
        C::Bluetooth,
        ANY,
        &[],
        None,
        gh("OpenIntelWireless", "IntelBluetoothFirmware"),
    ),
    kext(
        "IntelBTPatcher",
        "Intel Bluetooth fixes",
        C::Bluetooth,
        (21, None),
        LILU,
        Some(groups::INTEL_BT),
        gh("OpenIntelWireless", "IntelBluetoothFirmware"),
    ),
    kext(
        "IntelBluetoothInjector",
        "Intel Bluetooth injector",
        C::Bluetooth,
        (17, Some(20)),
        &[],
        Some(groups::INTEL_BT),
        gh("OpenIntelWireless", "IntelBluetoothFirmware"),
    ),
    // Storage
    kext("NVMeFix", "Third-party NVMe power management", C::Storage, (18, None), LILU, None, gh("acidanthera", "NVMeFix")),
    kext("CtlnaAHCIPort", "AHCI for unsupported SATA controllers", C::Storage, (20, None), &[], Some(groups::AHCI), Download::Extra("CtlnaAHCIPort")),
    kext("SATA-unsupported", "AHCI for unsupported SATA controllers", C::Storage, (17, Some(19)), &[], Some(groups::AHCI), Download::Extra("SATA-unsupported")),
    kext("RealtekCardReader", "Realtek PCIe card readers", C::Storage, (18, None), &[], None, gh("0xFireWolf", "RealtekCardReader")),
    kext(
        "RealtekCardReaderFriend",
        "Realtek card reader as a built-in reader",
        C::Storage,
        (18, None),
        &["Lilu", "RealtekCardReader"],
        None,
        gh("0xFireWolf", "RealtekCardReaderFriend"),
    ),
    // USB
    kext("XHCI-unsupported", "Intel XHCI without a native personality", C::Usb, ANY, &[], None, Download::Extra("XHCI-unsupported")),
    // Input
    kext("VoodooPS2Controller", "PS/2 keyboards and trackpads", C::Input, ANY, &[], None, gh("acidanthera", "VoodooPS2")),
    kext("VoodooI2C", "I2C input controller", C::Input, ANY, &[], None, gh("VoodooI2C", "VoodooI2C")),
    kext("VoodooI2CHID", "I2C HID devices", C::Input, ANY, &["VoodooI2C"], None, gh("VoodooI2C", "VoodooI2C")),
    kext("VoodooSMBus", "SMBus trackpads", C::Input, ANY, &[], None, gh("VoodooSMBus", "VoodooSMBus")),
    kext("VoodooRMI", "Synaptics RMI trackpads", C::Input, ANY, &["VoodooSMBus"], None, gh("VoodooSMBus", "VoodooRMI")),
    kext("AlpsHID", "ALPS I2C trackpads", C::Input, ANY, &["VoodooI2C"], None, gh("blankmac", "AlpsHID")),
    // CPU
    kext("CpuTscSync", "Intel TSC synchronisation", C::Cpu, ANY, LILU, Some(groups::TSC), gh("acidanthera", "CpuTscSync")),
    kext("AmdTscSync", "AMD TSC synchronisation", C::Cpu, ANY, &[], Some(groups::TSC), gh("naveenkrdy", "AmdTscSync")),
    kext("ForgedInvariant", "TSC synchronisation for AMD laptops", C::Cpu, ANY, LILU, Some(groups::TSC), gh("ChefKissInc", "ForgedInvariant")),
    kext("CpuTopologyRebuild", "Hybrid CPU topology fix", C::Cpu, (22, None), LILU, None, gh("b00t0x", "CpuTopologyRebuild")),
    kext("AppleMCEReporterDisabler", "Stop AppleMCEReporter panics", C::Cpu, ANY, &[], None, Download::Extra("AppleMCEReporterDisabler")),
    // Laptop
    kext("ECEnabler", "Battery readings from 16-bit EC fields", C::Laptop, ANY, LILU, None, gh("1Revenger1", "ECEnabler")),
    kext("BrightnessKeys", "Brightness hotkeys", C::Laptop, ANY, LILU, None, gh("acidanthera", "BrightnessKeys")),
    // Misc
    kext("RestrictEvents", "Process and update restrictions", C::Misc, ANY, LILU, None, gh("acidanthera", "RestrictEvents")),
    kext("CryptexFixup", "Non-AVX2 Ventura and newer", C::Misc, (22, None), LILU, None, gh("acidanthera", "CryptexFixup")),
    kext("AMFIPass", "AMFI with root patches", C::Misc, (20, None), LILU, None, Download::Extra("AMFIPass")),
    kext("FeatureUnlock", "Sidecar, AirPlay and Universal Control", C::Misc, (19, None), LILU, None, gh("acidanthera", "FeatureUnlock")),
];
