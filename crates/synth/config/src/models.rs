//! Mac models and the hardware classes they fit.

use ocforge_core::DarwinVersion;
use ocforge_hardware::HardwareReport;
use ocforge_hardware::ids::cpu::{self, IntelGen};

/// A Mac model and the releases it can boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacModel {
    /// `SystemProductName`.
    pub name: &'static str,
    /// First Darwin major.
    pub min_darwin: u32,
    /// Last Darwin major; `None` while still supported.
    pub max_darwin: Option<u32>,
}

impl MacModel {
    /// Returns `true` if the model boots `major`.
    #[must_use]
    pub fn supports(&self, major: u32) -> bool {
        self.min_darwin <= major && self.max_darwin.is_none_or(|max| major <= max)
    }
}

const fn model(name: &'static str, min_darwin: u32, max_darwin: Option<u32>) -> MacModel {
    MacModel { name, min_darwin, max_darwin }
}

/// Every model the generator can pick.
pub const MODELS: &[MacModel] = &[
    model("iMac13,1", 12, Some(19)),
    model("iMac13,2", 12, Some(19)),
    model("iMac14,4", 13, Some(20)),
    model("iMac15,1", 14, Some(20)),
    model("iMac17,1", 15, Some(21)),
    model("iMac18,3", 16, Some(22)),
    model("iMac19,1", 18, Some(24)),
    model("iMac20,1", 19, None),
    model("iMac20,2", 19, None),
    model("iMacPro1,1", 17, Some(24)),
    model("MacPro6,1", 13, Some(21)),
    model("MacPro7,1", 19, None),
    model("MacBookPro11,1", 13, Some(20)),
    model("MacBookPro12,1", 14, Some(21)),
    model("MacBookPro13,1", 16, Some(21)),
    model("MacBookPro14,1", 16, Some(22)),
    model("MacBookPro15,2", 17, Some(24)),
    model("MacBookPro16,2", 19, None),
    model("MacBookPro16,3", 19, Some(24)),
    model("MacBookAir9,1", 19, Some(24)),
];

/// Looks up a model by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static MacModel> {
    MODELS.iter().find(|m| m.name == name)
}

/// Candidate models for the machine, most faithful first.
fn candidates(report: &HardwareReport) -> Vec<&'static str> {
    let laptop = report.is_laptop();
    let has_dgpu = report.discrete_gpus().next().is_some();
    let generation = if report.cpu.is_intel() { IntelGen::from_codename(&report.cpu.codename) } else { None };
    let hedt = cpu::is_hedt_codename(&report.cpu.codename);

    let Some(generation) = generation else {
        return if laptop { vec!["MacBookPro16,3", "MacBookPro16,2"] } else { vec!["iMacPro1,1", "MacPro7,1"] };
    };
    if hedt && !laptop {
        return vec!["iMacPro1,1", "MacPro7,1"];
    }

    use IntelGen as G;
    let mut list = match (laptop, generation) {
        (false, G::SandyBridge | G::IvyBridge) => vec![if has_dgpu { "iMac13,2" } else { "iMac13,1" }, "MacPro6,1"],
        (false, G::Haswell | G::Broadwell) => vec![if has_dgpu { "iMac14,4" } else { "iMac15,1" }, "MacPro6,1"],
        (false, G::Skylake) => vec!["iMac17,1"],
        (false, G::KabyLake) => vec!["iMac18,3"],
        (false, G::CoffeeLake) => vec!["iMac19,1"],
        (false, G::CometLake) => vec![if report.cpu.core_count >= 10 { "iMac20,2" } else { "iMac20,1" }],
        (false, _) => vec![],
        (true, G::Haswell) => vec!["MacBookPro11,1", "MacBookPro14,1"],
        (true, G::Broadwell) => vec!["MacBookPro12,1", "MacBookPro14,1"],
        (true, G::Skylake) => vec!["MacBookPro13,1", "MacBookPro14,1"],
        (true, G::KabyLake) => vec!["MacBookPro14,1", "MacBookPro15,2"],
        (true, G::CoffeeLake | G::CometLake) => vec!["MacBookPro15,2", "MacBookPro16,2"],
        (true, G::IceLake) => vec!["MacBookAir9,1", "MacBookPro16,2"],
        (true, _) => vec![],
    };
    if laptop {
        list.extend(["MacBookPro16,3", "MacBookPro16,2"]);
    } else {
        list.extend(["iMacPro1,1", "MacPro7,1"]);
    }
    list
}

/// Picks the model for `report` running `target`: the first candidate that
/// boots the target, else the newest fallback.
#[must_use]
pub fn select_model(report: &HardwareReport, target: DarwinVersion) -> &'static str {
    let list = candidates(report);
    let chosen = list
        .iter()
        .copied()
        .find(|name| find(name).is_some_and(|m| m.supports(target.major)))
        .or_else(|| list.last().copied())
        .unwrap_or("iMacPro1,1");
    log::info!("SMBIOS model {chosen} for Darwin {}", target.major);
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(platform: &str, vendor: &str, codename: &str, cores: u32, gpu: &str) -> HardwareReport {
        HardwareReport::from_json(&format!(
            r#"{{
            "Motherboard": {{"Name": "Board", "Chipset": "Z490", "Platform": "{platform}"}},
            "CPU": {{"Manufacturer": "{vendor}", "Processor Name": "CPU", "Codename": "{codename}",
                     "Core Count": "{cores}", "CPU Count": "1", "SIMD Features": "SSE4.2, AVX2"}},
            "GPU": {{{gpu}}}
        }}"#
        ))
        .unwrap()
    }

    const NAVI: &str = r#""Radeon RX 6600": {"Bus Type": "PCI", "Device ID": "1002-73FF", "Device Type": "Discrete GPU", "Codename": "Navi 23"}"#;

    #[test]
    fn every_candidate_is_in_the_table() {
        for (platform, codename) in [("Desktop", "Ivy Bridge"), ("Laptop", "Haswell"), ("Laptop", "Ice Lake"), ("Desktop", "Alder Lake")] {
            for name in candidates(&report(platform, "Intel", codename, 4, "")) {
                assert!(find(name).is_some(), "{name}");
            }
        }
    }

    #[test]
    fn comet_lake_core_count_picks_the_imac() {
        let ten = report("Desktop", "Intel", "Comet Lake", 10, NAVI);
        assert_eq!(select_model(&ten, DarwinVersion::new(22, 0, 0)), "iMac20,2");
        let six = report("Desktop", "Intel", "Comet Lake", 6, "");
        assert_eq!(select_model(&six, DarwinVersion::new(22, 0, 0)), "iMac20,1");
    }

    #[test]
    fn unsupported_models_fall_through_to_newer_ones() {
        let ivy = report("Desktop", "Intel", "Ivy Bridge", 4, "");
        assert_eq!(select_model(&ivy, DarwinVersion::new(19, 0, 0)), "iMac13,1");
        assert_eq!(select_model(&ivy, DarwinVersion::new(21, 0, 0)), "MacPro6,1");
        assert_eq!(select_model(&ivy, DarwinVersion::new(23, 0, 0)), "iMacPro1,1");
        assert_eq!(select_model(&ivy, DarwinVersion::new(25, 0, 0)), "MacPro7,1");
    }

    #[test]
    fn defaults_for_amd_machines() {
        let desktop = report("Desktop", "AMD", "Vermeer", 8, NAVI);
        assert_eq!(select_model(&desktop, DarwinVersion::new(23, 0, 0)), "iMacPro1,1");
        assert_eq!(select_model(&desktop, DarwinVersion::new(25, 0, 0)), "MacPro7,1");
        let laptop = report("Laptop", "AMD", "Renoir", 8, "");
        assert_eq!(select_model(&laptop, DarwinVersion::new(23, 0, 0)), "MacBookPro16,3");
    }
}
