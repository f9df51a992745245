//! Chipset families.

/// High-end desktop / workstation chipsets.
pub const HEDT: &[&str] = &["X58", "X79", "C600", "C602", "X99", "C610", "C612", "X299", "C422", "C621"];

/// Intel 300-series PCH parts.
pub const SERIES_300: &[&str] = &[
    "Z390", "Z370", "H370", "B360", "B365", "H310", "Q370", "C246", "HM370", "QM370", "CM246",
];

/// Intel 400-series PCH parts.
pub const SERIES_400: &[&str] = &["Z490", "H470", "B460", "H410", "Q470", "W480", "HM470", "QM480", "WM490"];

/// Intel 6-series PCH parts (Sandy Bridge era).
pub const SERIES_6: &[&str] = &["P67", "H67", "Z68", "H61", "Q67", "Q65", "B65", "HM65", "HM67", "QM67", "UM67"];

/// Intel 7-series PCH parts (Ivy Bridge era).
pub const SERIES_7: &[&str] = &["Z77", "Z75", "H77", "B75", "Q77", "Q75", "HM76", "HM77", "QM77", "UM77", "HM70"];

/// Boards whose firmware maps MMIO regions OpenCore must devirtualise.
pub const DEVIRTUALISE_MMIO: &[&str] = &[
    "X99", "C610", "C612", "X299", "C422", "Z390", "Z490", "H470", "B460", "Q470", "W480", "Z590", "B560", "H570",
    "Z690", "B660", "H670", "Z790", "B760", "H770", "TRX40",
];

/// Chipsets that need the legacy `UNC` uncore bridge fix.
pub const UNCORE_BRIDGE: &[&str] = &["X79", "C600", "C602", "X99", "C610", "C612"];

fn contains(list: &[&str], chipset: &str) -> bool {
    list.iter().any(|c| chipset.eq_ignore_ascii_case(c) || chipset.split_whitespace().any(|w| w.eq_ignore_ascii_case(c)))
}

/// Returns `true` for HEDT chipsets.
#[must_use]
pub fn is_hedt(chipset: &str) -> bool {
    contains(HEDT, chipset)
}

/// Returns `true` for Intel 300-series chipsets.
#[must_use]
pub fn is_300_series(chipset: &str) -> bool {
    contains(SERIES_300, chipset)
}

/// Returns `true` for Intel 400-series chipsets.
#[must_use]
pub fn is_400_series(chipset: &str) -> bool {
    contains(SERIES_400, chipset)
}

/// Returns `true` for Sandy Bridge era chipsets.
#[must_use]
pub fn is_6_series(chipset: &str) -> bool {
    contains(SERIES_6, chipset)
}

/// Returns `true` for Ivy Bridge era chipsets.
#[must_use]
pub fn is_7_series(chipset: &str) -> bool {
    contains(SERIES_7, chipset)
}

/// Returns `true` for 6- and 7-series chipsets.
#[must_use]
pub fn is_6_or_7_series(chipset: &str) -> bool {
    is_6_series(chipset) || is_7_series(chipset)
}

/// Returns `true` if `DevirtualiseMmio` is needed.
#[must_use]
pub fn needs_devirtualise_mmio(chipset: &str) -> bool {
    contains(DEVIRTUALISE_MMIO, chipset)
}

/// Returns `true` for X79/X99-class boards.
#[must_use]
pub fn needs_uncore_fix(chipset: &str) -> bool {
    contains(UNCORE_BRIDGE, chipset)
}
