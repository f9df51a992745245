//! Typed view of a hardware report.
//!
//! The report is a JSON object keyed by category. `Motherboard`, `CPU` and
//! `BIOS` hold a single record; every other category maps a display name to
//! a device record. Display-name order is preserved through [`DeviceMap`].

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ReportError;

/// A `VVVV-DDDD` PCI/USB vendor-device pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    /// Vendor id.
    pub vendor: u16,
    /// Device id.
    pub device: u16,
}

impl DeviceId {
    /// Construct from halves.
    #[must_use]
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self { vendor, device }
    }
}

impl FromStr for DeviceId {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ReportError::InvalidDeviceId(s.to_string());
        let (v, d) = s.split_once('-').ok_or_else(bad)?;
        if v.len() != 4 || d.len() != 4 {
            return Err(bad());
        }
        Ok(Self {
            vendor: u16::from_str_radix(v, 16).map_err(|_| bad())?,
            device: u16::from_str_radix(d, 16).map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}-{:04X}", self.vendor, self.device)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(serde::de::Error::custom)
    }
}

/// Vendor ids the rules branch on.
pub mod vendor {
    /// Intel.
    pub const INTEL: u16 = 0x8086;
    /// AMD/ATI.
    pub const AMD: u16 = 0x1002;
    /// NVIDIA.
    pub const NVIDIA: u16 = 0x10DE;
    /// Broadcom.
    pub const BROADCOM: u16 = 0x14E4;
    /// Qualcomm Atheros (Wi-Fi).
    pub const ATHEROS: u16 = 0x168C;
    /// Qualcomm Atheros (Ethernet).
    pub const ATHEROS_ETH: u16 = 0x1969;
    /// Realtek.
    pub const REALTEK: u16 = 0x10EC;
    /// Aquantia.
    pub const AQUANTIA: u16 = 0x1D6A;
}

/// How a device is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    /// PCI / PCIe.
    #[serde(rename = "PCI")]
    Pci,
    /// USB.
    #[serde(rename = "USB")]
    Usb,
    /// ACPI-enumerated (I2C, LPC).
    #[serde(rename = "ACPI")]
    Acpi,
    /// Root complex.
    #[serde(rename = "ROOT")]
    Root,
}

/// Desktop or laptop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Desktop or server board.
    Desktop,
    /// Laptop.
    Laptop,
}

/// CPU vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuVendor {
    /// Intel.
    Intel,
    /// AMD.
    #[serde(rename = "AMD")]
    Amd,
}

/// GPU role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuType {
    /// Integrated graphics.
    #[serde(rename = "Integrated GPU")]
    Integrated,
    /// Discrete card.
    #[serde(rename = "Discrete GPU")]
    Discrete,
    /// Not reported.
    #[default]
    Unknown,
}

bitflags::bitflags! {
    /// CPU SIMD extensions reported under `SIMD Features`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SimdFeatures: u16 {
        /// SSE.
        const SSE = 1 << 0;
        /// SSE2.
        const SSE2 = 1 << 1;
        /// SSE3.
        const SSE3 = 1 << 2;
        /// SSSE3.
        const SSSE3 = 1 << 3;
        /// SSE4.1.
        const SSE4_1 = 1 << 4;
        /// SSE4.2.
        const SSE4_2 = 1 << 5;
        /// AVX.
        const AVX = 1 << 6;
        /// AVX2.
        const AVX2 = 1 << 7;
        /// AVX-512.
        const AVX512 = 1 << 8;
    }
}

impl SimdFeatures {
    /// Parses a comma-separated list such as `"SSE, SSE2, SSE4.1, AVX2"`.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        list.split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(Self::empty(), |acc, item| {
                acc | match item.to_ascii_uppercase().as_str() {
                    "SSE" => Self::SSE,
                    "SSE2" => Self::SSE2,
                    "SSE3" => Self::SSE3,
                    "SSSE3" => Self::SSSE3,
                    "SSE4.1" | "SSE4_1" => Self::SSE4_1,
                    "SSE4.2" | "SSE4_2" => Self::SSE4_2,
                    "AVX" => Self::AVX,
                    "AVX2" => Self::AVX2,
                    s if s.starts_with("AVX512") || s.starts_with("AVX-512") => Self::AVX512,
                    _ => Self::empty(),
                }
            })
    }
}

/// Bus-level identity shared by every device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Attachment.
    #[serde(rename = "Bus Type", default, skip_serializing_if = "Option::is_none")]
    pub bus_type: Option<BusType>,
    /// Vendor-device pair.
    #[serde(rename = "Device ID", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Subsystem vendor-device pair.
    #[serde(rename = "Subsystem ID", default, skip_serializing_if = "Option::is_none")]
    pub subsystem_id: Option<DeviceId>,
    /// `PciRoot(0x0)/Pci(0x1F,0x3)` style path.
    #[serde(rename = "PCI Path", default, skip_serializing_if = "Option::is_none")]
    pub pci_path: Option<String>,
    /// `\_SB.PCI0.GFX0` style path.
    #[serde(rename = "ACPI Path", default, skip_serializing_if = "Option::is_none")]
    pub acpi_path: Option<String>,
}

/// A generic device record (network, USB, input, storage, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Bus identity.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// ACPI hardware id for ACPI-enumerated devices.
    #[serde(rename = "Device", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Free-form device class.
    #[serde(rename = "Device Type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Keys this model does not know.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A GPU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuRecord {
    /// Bus identity.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Vendor name.
    #[serde(rename = "Manufacturer", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Architecture codename (`"Coffee Lake"`, `"Navi 21"`, `"Kepler"`).
    #[serde(rename = "Codename", default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    /// Integrated or discrete.
    #[serde(rename = "Device Type", default)]
    pub device_type: GpuType,
    /// Keys this model does not know.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GpuRecord {
    /// Vendor id, if known.
    #[must_use]
    pub fn vendor(&self) -> Option<u16> {
        self.info.device_id.map(|id| id.vendor)
    }
}

/// A display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    /// `HDMI`, `DP`, `VGA`, `DVI`, `Internal`.
    #[serde(rename = "Connector Type", default, skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<String>,
    /// Display name of the GPU driving it.
    #[serde(rename = "Connected GPU", default, skip_serializing_if = "Option::is_none")]
    pub connected_gpu: Option<String>,
    /// `1920x1080`.
    #[serde(rename = "Resolution", default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Keys this model does not know.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// An audio codec or controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundRecord {
    /// Bus identity; for codecs the `Device ID` is the codec id.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Output/input endpoints.
    #[serde(rename = "Audio Endpoints", default, skip_serializing_if = "Vec::is_empty")]
    pub audio_endpoints: Vec<String>,
    /// Keys this model does not know.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Motherboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motherboard {
    /// Board name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Chipset (`"Z390"`, `"B550"`).
    #[serde(rename = "Chipset")]
    pub chipset: String,
    /// Desktop or laptop.
    #[serde(rename = "Platform")]
    pub platform: Platform,
}

/// Firmware summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bios {
    /// `UEFI` or `Legacy`.
    #[serde(rename = "Firmware Type", default, skip_serializing_if = "Option::is_none")]
    pub firmware_type: Option<String>,
    /// `Enabled` or `Disabled`.
    #[serde(rename = "Secure Boot", default, skip_serializing_if = "Option::is_none")]
    pub secure_boot: Option<String>,
    /// `Enabled` when resizable BAR is on.
    #[serde(rename = "Resizable BAR", default, skip_serializing_if = "Option::is_none")]
    pub resizable_bar: Option<String>,
}

mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &u32, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(n)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        String::deserialize(d)?.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// CPU summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    /// Vendor.
    #[serde(rename = "Manufacturer")]
    pub manufacturer: CpuVendor,
    /// Marketing name.
    #[serde(rename = "Processor Name")]
    pub processor_name: String,
    /// Microarchitecture codename.
    #[serde(rename = "Codename")]
    pub codename: String,
    /// Physical cores per package.
    #[serde(rename = "Core Count", with = "decimal")]
    pub core_count: u32,
    /// Number of packages.
    #[serde(rename = "CPU Count", with = "decimal")]
    pub cpu_count: u32,
    /// Comma-separated SIMD extensions.
    #[serde(rename = "SIMD Features", default)]
    pub simd_features: String,
}

impl Cpu {
    /// Parsed SIMD flags.
    #[must_use]
    pub fn simd(&self) -> SimdFeatures {
        SimdFeatures::parse(&self.simd_features)
    }

    /// Returns `true` for Intel CPUs.
    #[must_use]
    pub fn is_intel(&self) -> bool {
        self.manufacturer == CpuVendor::Intel
    }
}

/// Display-name → record map that keeps report order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMap<T>(pub Vec<(String, T)>);

impl<T> Default for DeviceMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> DeviceMap<T> {
    /// Iterates `(name, record)` in report order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks a device up by display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for DeviceMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for DeviceMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for MapVisitor<T> {
            type Value = DeviceMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of device name to device record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry()? {
                    out.push((k, v));
                }
                Ok(DeviceMap(out))
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

/// The whole report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareReport {
    /// Board.
    #[serde(rename = "Motherboard")]
    pub motherboard: Motherboard,
    /// Firmware.
    #[serde(rename = "BIOS", default, skip_serializing_if = "Option::is_none")]
    pub bios: Option<Bios>,
    /// Processor.
    #[serde(rename = "CPU")]
    pub cpu: Cpu,
    /// Graphics.
    #[serde(rename = "GPU", default)]
    pub gpu: DeviceMap<GpuRecord>,
    /// Displays.
    #[serde(rename = "Monitor", default)]
    pub monitor: DeviceMap<MonitorRecord>,
    /// Wired and wireless network adapters.
    #[serde(rename = "Network", default)]
    pub network: DeviceMap<DeviceRecord>,
    /// Audio codecs.
    #[serde(rename = "Sound", default)]
    pub sound: DeviceMap<SoundRecord>,
    /// XHCI/EHCI controllers.
    #[serde(rename = "USB Controllers", default)]
    pub usb_controllers: DeviceMap<DeviceRecord>,
    /// Keyboards, touchpads, touchscreens.
    #[serde(rename = "Input", default)]
    pub input: DeviceMap<DeviceRecord>,
    /// SATA/NVMe/RAID controllers.
    #[serde(rename = "Storage Controllers", default)]
    pub storage_controllers: DeviceMap<DeviceRecord>,
    /// Bluetooth radios.
    #[serde(rename = "Bluetooth", default)]
    pub bluetooth: DeviceMap<DeviceRecord>,
    /// SD card hosts.
    #[serde(rename = "SD Controller", default)]
    pub sd_controller: DeviceMap<DeviceRecord>,
    /// Fingerprint readers.
    #[serde(rename = "Biometric", default)]
    pub biometric: DeviceMap<DeviceRecord>,
    /// Chipset devices (SMBus, LPC, MEI, ...).
    #[serde(rename = "System Devices", default)]
    pub system_devices: DeviceMap<DeviceRecord>,
}

impl HardwareReport {
    /// Parses a report from JSON text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Json`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts a validated JSON value into the typed report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Json`] if the value does not fit the model.
    pub fn from_value(value: Value) -> Result<Self, ReportError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` on laptops.
    #[must_use]
    pub fn is_laptop(&self) -> bool {
        self.motherboard.platform == Platform::Laptop
    }

    /// The integrated GPU, if reported.
    #[must_use]
    pub fn integrated_gpu(&self) -> Option<(&str, &GpuRecord)> {
        self.gpu.iter().find(|(_, g)| g.device_type == GpuType::Integrated)
    }

    /// Discrete GPUs in report order.
    pub fn discrete_gpus(&self) -> impl Iterator<Item = (&str, &GpuRecord)> {
        self.gpu.iter().filter(|(_, g)| g.device_type == GpuType::Discrete)
    }

    /// Every PCI-addressable device as `(category, name, info)`.
    pub fn pci_devices(&self) -> impl Iterator<Item = (&'static str, &str, &DeviceInfo)> {
        let gpu = self.gpu.iter().map(|(n, r)| ("GPU", n, &r.info));
        let sound = self.sound.iter().map(|(n, r)| ("Sound", n, &r.info));
        let generic = [
            ("Network", &self.network),
            ("USB Controllers", &self.usb_controllers),
            ("Storage Controllers", &self.storage_controllers),
            ("Bluetooth", &self.bluetooth),
            ("SD Controller", &self.sd_controller),
            ("System Devices", &self.system_devices),
        ]
        .into_iter()
        .flat_map(|(cat, map)| map.iter().map(move |(n, r)| (cat, n, &r.info)));
        gpu.chain(sound).chain(generic).filter(|(_, _, info)| info.bus_type == Some(BusType::Pci))
    }

    /// Returns `true` if any input device is an I2C HID device.
    #[must_use]
    pub fn has_i2c_input(&self) -> bool {
        self.input.iter().any(|(name, r)| {
            let path_is_i2c = r.info.acpi_path.as_deref().is_some_and(|p| p.contains(".I2C"));
            let type_is_i2c = r.device_type.as_deref().is_some_and(|t| t.contains("I2C"));
            r.info.bus_type == Some(BusType::Acpi) && (path_is_i2c || type_is_i2c || name.contains("I2C"))
        })
    }
}
