//! CPU generations.

/// Intel microarchitectures in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntelGen {
    /// Core 2.
    Penryn,
    /// 1st gen Core.
    Nehalem,
    /// 1st gen Core, 32 nm.
    Westmere,
    /// 2nd gen.
    SandyBridge,
    /// 3rd gen.
    IvyBridge,
    /// 4th gen.
    Haswell,
    /// 5th gen.
    Broadwell,
    /// 6th gen.
    Skylake,
    /// 7th gen (also Amber Lake).
    KabyLake,
    /// 8th/9th gen (also Whiskey Lake).
    CoffeeLake,
    /// 10th gen 14 nm.
    CometLake,
    /// 10th gen 10 nm.
    IceLake,
    /// 11th gen mobile.
    TigerLake,
    /// 11th gen desktop.
    RocketLake,
    /// 12th gen.
    AlderLake,
    /// 13th/14th gen.
    RaptorLake,
    /// Core Ultra 1.
    MeteorLake,
    /// Core Ultra 2.
    ArrowLake,
}

const NAMES: &[(&str, IntelGen)] = &[
    ("penryn", IntelGen::Penryn),
    ("wolfdale", IntelGen::Penryn),
    ("yorkfield", IntelGen::Penryn),
    ("nehalem", IntelGen::Nehalem),
    ("lynnfield", IntelGen::Nehalem),
    ("clarksfield", IntelGen::Nehalem),
    ("bloomfield", IntelGen::Nehalem),
    ("westmere", IntelGen::Westmere),
    ("arrandale", IntelGen::Westmere),
    ("clarkdale", IntelGen::Westmere),
    ("gulftown", IntelGen::Westmere),
    ("sandy bridge", IntelGen::SandyBridge),
    ("ivy bridge", IntelGen::IvyBridge),
    ("haswell", IntelGen::Haswell),
    ("broadwell", IntelGen::Broadwell),
    ("skylake", IntelGen::Skylake),
    ("cascade lake", IntelGen::Skylake),
    ("kaby lake", IntelGen::KabyLake),
    ("amber lake", IntelGen::KabyLake),
    ("coffee lake", IntelGen::CoffeeLake),
    ("whiskey lake", IntelGen::CoffeeLake),
    ("cannon lake", IntelGen::CoffeeLake),
    ("comet lake", IntelGen::CometLake),
    ("ice lake", IntelGen::IceLake),
    ("tiger lake", IntelGen::TigerLake),
    ("rocket lake", IntelGen::RocketLake),
    ("alder lake", IntelGen::AlderLake),
    ("raptor lake", IntelGen::RaptorLake),
    ("meteor lake", IntelGen::MeteorLake),
    ("arrow lake", IntelGen::ArrowLake),
];

impl IntelGen {
    /// Parses a codename such as `"Coffee Lake"`, `"Haswell-E"` or
    /// `"Kaby Lake-R"`. Longest match wins.
    #[must_use]
    pub fn from_codename(codename: &str) -> Option<Self> {
        let lower = codename.to_ascii_lowercase();
        NAMES
            .iter()
            .filter(|(name, _)| lower.contains(name))
            .max_by_key(|(name, _)| name.len())
            .map(|&(_, generation)| generation)
    }
}

/// Returns `true` for server/HEDT variants (`-E`, `-EP`, `-X`, `-W`, `-SP`).
#[must_use]
pub fn is_hedt_codename(codename: &str) -> bool {
    let trimmed = codename.trim();
    ["-E", "-EP", "-EX", "-X", "-W", "-SP"]
        .iter()
        .any(|suffix| trimmed.len() > suffix.len() && trimmed.to_ascii_uppercase().ends_with(suffix))
        || codename.to_ascii_lowercase().contains("cascade lake")
}

/// Returns `true` for Pentium, Celeron and Atom parts, which lack AVX.
#[must_use]
pub fn is_low_end(processor_name: &str) -> bool {
    ["Pentium", "Celeron", "Atom"].iter().any(|n| processor_name.contains(n))
}

/// AMD Zen-era codenames.
const ZEN: &[&str] = &[
    "summit ridge", "pinnacle ridge", "matisse", "vermeer", "raphael", "granite ridge", "raven ridge", "picasso",
    "renoir", "lucienne", "cezanne", "barcelo", "rembrandt", "phoenix", "hawk point", "dali", "pollock",
    "mendocino", "threadripper", "whitehaven", "colfax", "castle peak", "chagall", "zen",
];

/// Returns `true` for Ryzen / Threadripper era AMD codenames.
#[must_use]
pub fn is_amd_zen(codename: &str) -> bool {
    let lower = codename.to_ascii_lowercase();
    ZEN.iter().any(|z| lower.contains(z))
}

/// Returns `true` for AMD APUs with Vega/RDNA integrated graphics.
#[must_use]
pub fn is_amd_apu(codename: &str) -> bool {
    let lower = codename.to_ascii_lowercase();
    ["raven ridge", "picasso", "renoir", "lucienne", "cezanne", "barcelo", "rembrandt", "dali", "mendocino"]
        .iter()
        .any(|z| lower.contains(z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codenames_resolve_and_order() {
        assert_eq!(IntelGen::from_codename("Coffee Lake"), Some(IntelGen::CoffeeLake));
        assert_eq!(IntelGen::from_codename("Haswell-E"), Some(IntelGen::Haswell));
        assert_eq!(IntelGen::from_codename("Comet Lake"), Some(IntelGen::CometLake));
        assert_eq!(IntelGen::from_codename("Matisse"), None);
        assert!(IntelGen::IvyBridge < IntelGen::Haswell);
        assert!(IntelGen::CometLake < IntelGen::AlderLake);
    }

    #[test]
    fn hedt_and_zen() {
        assert!(is_hedt_codename("Broadwell-E"));
        assert!(is_hedt_codename("Skylake-X"));
        assert!(!is_hedt_codename("Skylake"));
        assert!(is_amd_zen("Vermeer"));
        assert!(is_amd_apu("Cezanne"));
        assert!(!is_amd_apu("Vermeer"));
        assert!(is_low_end("Intel Pentium Gold G5400"));
    }
}
