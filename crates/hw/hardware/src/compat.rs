//! Compatibility matrix: which macOS releases each device supports.
//!
//! Ranges are inclusive Darwin majors. Every device gets a native range and,
//! when the legacy patcher can carry it further, an extended one. The
//! overall range is the CPU range intersected with the span of the
//! supported display GPUs.

use std::fmt;

use ocforge_core::{DarwinVersion, os};
use serde::Serialize;

use crate::ids::cpu::{self, IntelGen};
use crate::ids::gpu::GpuFamily;
use crate::ids::{audio, network, storage};
use crate::report::BusType;
use crate::{DeviceInfo, HardwareReport, SimdFeatures};

/// Inclusive range of Darwin majors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OsRange {
    /// Lowest supported major.
    pub min: u32,
    /// Highest supported major.
    pub max: u32,
}

impl OsRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Every release in the compiled-in table, betas included.
    #[must_use]
    pub fn all() -> Self {
        Self::new(os::lowest().major, os::newest(true).darwin_major)
    }

    /// Returns `true` if `major` lies inside the range.
    #[must_use]
    pub const fn contains(self, major: u32) -> bool {
        self.min <= major && major <= self.max
    }

    /// Intersection, or `None` when disjoint.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let r = Self::new(self.min.max(other.min), self.max.min(other.max));
        (r.min <= r.max).then_some(r)
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn span(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// First kernel in the range.
    #[must_use]
    pub const fn floor(self) -> DarwinVersion {
        DarwinVersion::major_floor(self.min)
    }

    /// Last kernel in the range.
    #[must_use]
    pub const fn ceiling(self) -> DarwinVersion {
        DarwinVersion::major_ceiling(self.max)
    }

    fn window(min: u32, max: Option<u32>) -> Option<Self> {
        let all = Self::all();
        let max = max.unwrap_or(all.max).min(all.max);
        Self::new(min.max(all.min), max).intersect(all)
    }
}

impl fmt::Display for OsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |major| os::by_darwin(major).map_or_else(|| format!("Darwin {major}"), |r| r.name.to_string());
        write!(f, "{} ({}) to {} ({})", name(self.min), self.min, name(self.max), self.max)
    }
}

/// Verdict for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCompat {
    /// Report category (`"GPU"`, `"Network"`).
    pub category: &'static str,
    /// Display name.
    pub name: String,
    /// Bus identity, for disabling the device through ACPI.
    pub info: DeviceInfo,
    /// Releases with a stock driver.
    pub native: Option<OsRange>,
    /// Releases reachable with the legacy patcher.
    pub extended: Option<OsRange>,
}

impl DeviceCompat {
    fn new(category: &'static str, name: &str, info: &DeviceInfo, native: Option<OsRange>) -> Self {
        Self { category, name: name.to_string(), info: info.clone(), native, extended: native }
    }

    fn with_patcher(mut self, patcher_max: Option<u32>) -> Self {
        if let Some(patcher_max) = patcher_max {
            let all = OsRange::all();
            let min = self.native.map_or(all.min, |r| r.min);
            self.extended = OsRange::window(min, Some(patcher_max));
        }
        self
    }

    /// The range in effect.
    #[must_use]
    pub fn range(&self, with_patcher: bool) -> Option<OsRange> {
        if with_patcher { self.extended } else { self.native }
    }

    /// Returns `true` if `major` is supported.
    #[must_use]
    pub fn supports(&self, major: u32, with_patcher: bool) -> bool {
        self.range(with_patcher).is_some_and(|r| r.contains(major))
    }
}

/// Result of [`check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    /// CPU native range.
    pub cpu: Option<OsRange>,
    /// CPU range with the legacy patcher.
    pub cpu_extended: Option<OsRange>,
    /// Per-device verdicts in report order.
    pub devices: Vec<DeviceCompat>,
    /// Releases the whole machine can run.
    pub overall: Option<OsRange>,
    /// Whether [`Self::overall`] assumes the legacy patcher.
    pub with_patcher: bool,
}

impl CompatibilityReport {
    /// Returns `true` if the machine can run `major`.
    #[must_use]
    pub fn supports(&self, major: u32) -> bool {
        self.overall.is_some_and(|r| r.contains(major))
    }

    /// Returns `true` when some kept device only works at `target` thanks to
    /// the legacy patcher.
    #[must_use]
    pub fn needs_legacy_patcher(&self, target: u32, user_disabled: &[String]) -> bool {
        let cpu = !self.cpu.is_some_and(|r| r.contains(target)) && self.cpu_extended.is_some_and(|r| r.contains(target));
        cpu || self
            .devices
            .iter()
            .filter(|d| !user_disabled.contains(&d.name))
            .any(|d| !d.supports(target, false) && d.supports(target, true))
    }

    /// Devices to hide from macOS at `target`: the ones the user excluded
    /// plus every PCI device with no support there.
    #[must_use]
    pub fn disabled_devices(&self, target: u32, with_patcher: bool, user_disabled: &[String]) -> Vec<DeviceCompat> {
        self.devices
            .iter()
            .filter(|d| {
                user_disabled.contains(&d.name)
                    || (d.info.bus_type == Some(BusType::Pci) && !d.supports(target, with_patcher))
            })
            .cloned()
            .collect()
    }
}

/// CPU native range and patcher reach.
fn cpu_window(report: &HardwareReport) -> (Option<OsRange>, Option<u32>) {
    let simd = report.cpu.simd();
    if !simd.contains(SimdFeatures::SSE4_1) && !simd.is_empty() {
        return (None, None);
    }
    let min = match IntelGen::from_codename(&report.cpu.codename) {
        Some(IntelGen::CometLake | IntelGen::IceLake | IntelGen::TigerLake | IntelGen::RocketLake) => 19,
        Some(g) if g >= IntelGen::AlderLake => 21,
        _ => 17,
    };
    if !simd.is_empty() && !simd.contains(SimdFeatures::SSE4_2) {
        return (OsRange::window(min, Some(18)), None);
    }
    if !simd.is_empty() && !simd.contains(SimdFeatures::AVX2) {
        return (OsRange::window(min, Some(21)), Some(u32::MAX));
    }
    (OsRange::window(min, None), None)
}

fn gpu_entries(report: &HardwareReport) -> Vec<DeviceCompat> {
    report
        .gpu
        .iter()
        .map(|(name, gpu)| {
            let window = gpu
                .vendor()
                .and_then(|v| GpuFamily::classify(v, gpu.codename.as_deref().unwrap_or_default()))
                .and_then(GpuFamily::window);
            let native = window.and_then(|w| OsRange::window(w.min, w.max));
            DeviceCompat::new("GPU", name, &gpu.info, native).with_patcher(window.and_then(|w| w.patcher_max))
        })
        .collect()
}

/// Builds the compatibility matrix.
#[must_use]
pub fn check(report: &HardwareReport, with_patcher: bool) -> CompatibilityReport {
    let all = Some(OsRange::all());
    let (cpu, cpu_patcher) = cpu_window(report);
    let cpu_extended = match cpu_patcher {
        Some(max) => OsRange::window(cpu.map_or(17, |r| r.min), Some(max)),
        None => cpu,
    };

    let mut devices = gpu_entries(report);
    for (name, net) in report.network.iter() {
        let entry = match (net.info.bus_type, net.info.device_id.and_then(network::classify)) {
            (Some(BusType::Pci), Some(adapter)) => {
                let (min, max) = adapter.native_window();
                DeviceCompat::new("Network", name, &net.info, OsRange::window(min, max))
                    .with_patcher(adapter.patcher_max())
            }
            (Some(BusType::Pci), None) => DeviceCompat::new("Network", name, &net.info, None),
            _ => DeviceCompat::new("Network", name, &net.info, all),
        };
        devices.push(entry);
    }
    for (name, sound) in report.sound.iter() {
        let known = sound.info.device_id.and_then(audio::layouts).is_some();
        devices.push(DeviceCompat::new("Sound", name, &sound.info, if known { all } else { None }));
    }
    for (name, st) in report.storage_controllers.iter() {
        let bad = st.info.device_id.is_some_and(storage::is_unsupported_storage);
        devices.push(DeviceCompat::new("Storage Controllers", name, &st.info, if bad { None } else { all }));
    }
    for (name, sd) in report.sd_controller.iter() {
        let ok = sd.info.device_id.is_some_and(storage::is_realtek_card_reader);
        devices.push(DeviceCompat::new("SD Controller", name, &sd.info, if ok { all } else { None }));
    }

    let gpus: Vec<_> = devices.iter().filter(|d| d.category == "GPU").collect();
    let gpu_span = if gpus.is_empty() {
        all
    } else {
        gpus.iter().filter_map(|d| d.range(with_patcher)).reduce(OsRange::span)
    };
    let cpu_range = if with_patcher { cpu_extended } else { cpu };
    let overall = cpu_range.zip(gpu_span).and_then(|(c, g)| c.intersect(g));
    if let Some(range) = overall {
        log::info!("supported macOS range: {range}");
    } else {
        log::warn!("no macOS release supports this CPU/GPU combination");
    }

    CompatibilityReport { cpu, cpu_extended, devices, overall, with_patcher }
}

/// Returns the newest release the machine supports, honouring betas.
#[must_use]
pub fn default_target(compat: &CompatibilityReport, include_beta: bool) -> Option<u32> {
    let newest = os::newest(include_beta).darwin_major;
    compat.overall.and_then(|r| r.intersect(OsRange::new(r.min, newest))).map(|r| r.max)
}

/// Returns `true` when the machine only runs `target` with the legacy patcher.
#[must_use]
pub fn needs_legacy_patcher(report: &HardwareReport, target: u32, user_disabled: &[String]) -> bool {
    check(report, true).needs_legacy_patcher(target, user_disabled)
}

/// Returns `true` for HEDT platforms (by CPU codename or chipset).
#[must_use]
pub fn is_hedt(report: &HardwareReport) -> bool {
    cpu::is_hedt_codename(&report.cpu.codename) || crate::ids::chipset::is_hedt(&report.motherboard.chipset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(simd: &str, codename: &str, gpus: &str) -> HardwareReport {
        let text = format!(
            r#"{{
            "Motherboard": {{"Name": "Board", "Chipset": "Z390", "Platform": "Desktop"}},
            "CPU": {{"Manufacturer": "Intel", "Processor Name": "Intel Core", "Codename": "{codename}",
                     "Core Count": "6", "CPU Count": "1", "SIMD Features": "{simd}"}},
            "GPU": {gpus},
            "Network": {{"Intel Wi-Fi 6 AX200": {{"Bus Type": "PCI", "Device ID": "8086-2723"}},
                         "Mystery NIC": {{"Bus Type": "PCI", "Device ID": "1234-5678"}}}}
        }}"#
        );
        HardwareReport::from_json(&text).unwrap()
    }

    const MODERN: &str = "SSE, SSE2, SSE3, SSSE3, SSE4.1, SSE4.2, AVX, AVX2";

    #[test]
    fn modern_cpu_with_polaris_supports_everything() {
        let r = report(
            MODERN,
            "Coffee Lake",
            r#"{"RX 580": {"Bus Type": "PCI", "Device ID": "1002-67DF", "Codename": "Polaris 20", "Device Type": "Discrete GPU"}}"#,
        );
        let compat = check(&r, false);
        assert_eq!(compat.overall, Some(OsRange::all()));
        let disabled = compat.disabled_devices(23, false, &[]);
        assert_eq!(disabled.len(), 1);
        assert_eq!(disabled[0].name, "Mystery NIC");
    }

    #[test]
    fn kepler_caps_the_range_unless_patched() {
        let r = report(
            MODERN,
            "Haswell",
            r#"{"GT 710": {"Bus Type": "PCI", "Device ID": "10DE-128B", "Codename": "GK208", "Device Type": "Discrete GPU"}}"#,
        );
        assert_eq!(check(&r, false).overall.map(|o| o.max), Some(20));
        assert_eq!(check(&r, true).overall.map(|o| o.max), Some(OsRange::all().max));
        assert!(needs_legacy_patcher(&r, 22, &[]));
        assert!(!needs_legacy_patcher(&r, 20, &[]));
    }

    #[test]
    fn missing_avx2_needs_patcher_past_monterey() {
        let r = report("SSE, SSE2, SSE3, SSSE3, SSE4.1, SSE4.2, AVX", "Ivy Bridge", "{}");
        let compat = check(&r, false);
        assert_eq!(compat.overall.map(|o| o.max), Some(21));
        assert!(compat.needs_legacy_patcher(23, &[]));
    }

    #[test]
    fn range_display_names_releases() {
        assert_eq!(OsRange::new(17, 24).to_string(), "High Sierra (17) to Sequoia (24)");
        assert_eq!(OsRange::new(20, 22).intersect(OsRange::new(23, 24)), None);
    }
}
