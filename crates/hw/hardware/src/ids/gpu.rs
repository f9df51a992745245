//! GPU families and their macOS windows.

use super::cpu::IntelGen;

/// Driver family of a GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuFamily {
    /// Intel integrated graphics of the given generation.
    Intel(IntelGen),
    /// AMD GCN 1-3 (Tahiti, Hawaii, Tonga, Fiji).
    AmdGcnLegacy,
    /// AMD Polaris and Lexa.
    AmdPolaris,
    /// AMD Vega 10/20.
    AmdVega,
    /// AMD Navi 10/14.
    AmdNavi1,
    /// AMD Navi 21/22/23.
    AmdNavi2,
    /// NVIDIA Kepler.
    NvidiaKepler,
    /// NVIDIA Fermi, Maxwell, Pascal (web drivers, High Sierra only).
    NvidiaWebDriver,
}

/// Native window and patcher reach for a family, in Darwin majors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuWindow {
    /// First supported major.
    pub min: u32,
    /// Last supported major; `None` means still supported.
    pub max: Option<u32>,
    /// Last major the legacy patcher reaches, if it helps.
    pub patcher_max: Option<u32>,
}

const fn window(min: u32, max: Option<u32>, patcher_max: Option<u32>) -> GpuWindow {
    GpuWindow { min, max, patcher_max }
}

const AMD_CODENAMES: &[(&str, GpuFamily)] = &[
    ("navi 10", GpuFamily::AmdNavi1),
    ("navi 14", GpuFamily::AmdNavi1),
    ("navi 21", GpuFamily::AmdNavi2),
    ("navi 22", GpuFamily::AmdNavi2),
    ("navi 23", GpuFamily::AmdNavi2),
    ("vega 10", GpuFamily::AmdVega),
    ("vega 20", GpuFamily::AmdVega),
    ("polaris", GpuFamily::AmdPolaris),
    ("ellesmere", GpuFamily::AmdPolaris),
    ("baffin", GpuFamily::AmdPolaris),
    ("lexa", GpuFamily::AmdPolaris),
    ("tahiti", GpuFamily::AmdGcnLegacy),
    ("pitcairn", GpuFamily::AmdGcnLegacy),
    ("cape verde", GpuFamily::AmdGcnLegacy),
    ("bonaire", GpuFamily::AmdGcnLegacy),
    ("hawaii", GpuFamily::AmdGcnLegacy),
    ("tonga", GpuFamily::AmdGcnLegacy),
    ("fiji", GpuFamily::AmdGcnLegacy),
];

const NVIDIA_CODENAMES: &[(&str, GpuFamily)] = &[
    ("kepler", GpuFamily::NvidiaKepler),
    ("gk1", GpuFamily::NvidiaKepler),
    ("gk2", GpuFamily::NvidiaKepler),
    ("fermi", GpuFamily::NvidiaWebDriver),
    ("maxwell", GpuFamily::NvidiaWebDriver),
    ("pascal", GpuFamily::NvidiaWebDriver),
    ("gm1", GpuFamily::NvidiaWebDriver),
    ("gm2", GpuFamily::NvidiaWebDriver),
    ("gp1", GpuFamily::NvidiaWebDriver),
];

impl GpuFamily {
    /// Classifies a GPU by vendor id and codename.
    #[must_use]
    pub fn classify(vendor: u16, codename: &str) -> Option<Self> {
        use crate::report::vendor::{AMD, INTEL, NVIDIA};
        let lower = codename.to_ascii_lowercase();
        let lookup = |table: &[(&str, Self)]| table.iter().find(|(n, _)| lower.contains(n)).map(|&(_, f)| f);
        match vendor {
            INTEL => IntelGen::from_codename(codename).map(Self::Intel),
            AMD => lookup(AMD_CODENAMES),
            NVIDIA => lookup(NVIDIA_CODENAMES),
            _ => None,
        }
    }

    /// Supported window, or `None` if macOS has no driver at all.
    #[must_use]
    pub const fn window(self) -> Option<GpuWindow> {
        let latest = Some(u32::MAX);
        Some(match self {
            Self::Intel(generation) => match generation {
                IntelGen::Penryn | IntelGen::Nehalem | IntelGen::Westmere => window(17, Some(17), Some(22)),
                IntelGen::SandyBridge => window(17, Some(17), latest),
                IntelGen::IvyBridge => window(17, Some(20), latest),
                IntelGen::Haswell | IntelGen::Broadwell | IntelGen::Skylake => window(17, Some(21), latest),
                IntelGen::KabyLake | IntelGen::CoffeeLake | IntelGen::CometLake => window(17, None, None),
                IntelGen::IceLake => window(19, None, None),
                _ => return None,
            },
            Self::AmdGcnLegacy => window(17, Some(21), latest),
            Self::AmdPolaris | Self::AmdVega => window(17, None, None),
            Self::AmdNavi1 => window(19, None, None),
            Self::AmdNavi2 => window(20, None, None),
            Self::NvidiaKepler => window(17, Some(20), latest),
            Self::NvidiaWebDriver => window(17, Some(17), None),
        })
    }
}
