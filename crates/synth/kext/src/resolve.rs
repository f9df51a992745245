//! Per-build kext selection.
//!
//! Requests pull in their `requires` closure and evict conflict-group
//! siblings. The catalog itself is never touched.

use std::collections::BTreeSet;

use ocforge_core::DarwinVersion;

use crate::catalog::{KextId, KextInfo};

/// Why a requested kext was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not in the catalog.
    Unknown,
    /// The target OS is outside the kext's window.
    Unsupported {
        /// First supported major.
        min: u32,
        /// Last supported major.
        max: Option<u32>,
    },
}

/// A request that was not honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedKext {
    /// Requested name.
    pub name: String,
    /// Why.
    pub reason: SkipReason,
}

/// The set of kexts chosen for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KextSelection {
    selected: BTreeSet<KextId>,
    target: DarwinVersion,
    allow_unsupported: bool,
    skipped: Vec<SkippedKext>,
}

impl KextSelection {
    /// Starts from the required kexts.
    #[must_use]
    pub fn new(target: DarwinVersion, allow_unsupported: bool) -> Self {
        let selected = KextId::all().filter(|id| id.info().required).collect();
        Self { selected, target, allow_unsupported, skipped: Vec::new() }
    }

    /// Target the selection is for.
    #[must_use]
    pub fn target(&self) -> DarwinVersion {
        self.target
    }

    /// Returns `true` if out-of-window kexts may be selected.
    #[must_use]
    pub fn allow_unsupported(&self) -> bool {
        self.allow_unsupported
    }

    /// Requests `name` and, recursively, everything it requires.
    ///
    /// Returns `true` if the kext is selected afterwards.
    pub fn check_kext(&mut self, name: &str) -> bool {
        let Some(id) = KextId::of(name) else {
            log::warn!("unknown kext `{name}` requested");
            self.skip(name, SkipReason::Unknown);
            return false;
        };
        if self.selected.contains(&id) {
            return true;
        }
        let info = id.info();
        if !self.allow_unsupported && !info.supports(self.target) {
            log::info!("skipping {}: supports Darwin {}..{:?}, target is {}", info.name, info.min_darwin, info.max_darwin, self.target);
            self.skip(info.name, SkipReason::Unsupported { min: info.min_darwin, max: info.max_darwin });
            return false;
        }

        self.selected.insert(id);
        for dep in info.requires {
            self.check_kext(dep);
        }
        if let Some(group) = info.conflict_group {
            self.evict_group(id, group);
        }
        true
    }

    fn evict_group(&mut self, keep: KextId, group: &str) {
        let evicted: Vec<KextId> = self
            .selected
            .iter()
            .copied()
            .filter(|&other| other != keep && other.info().conflict_group == Some(group))
            .collect();
        for other in evicted {
            log::info!("{keep} replaces {other} (conflict group {group})");
            self.selected.remove(&other);
        }
    }

    fn skip(&mut self, name: &str, reason: SkipReason) {
        if !self.skipped.iter().any(|s| s.name == name) {
            self.skipped.push(SkippedKext { name: name.to_string(), reason });
        }
    }

    /// Removes `name`; dependents stay selected.
    pub fn remove(&mut self, name: &str) {
        if let Some(id) = KextId::of(name) {
            self.selected.remove(&id);
        }
    }

    /// Returns `true` if `name` is selected.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        KextId::of(name).is_some_and(|id| self.selected.contains(&id))
    }

    /// Selected ids, in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = KextId> + '_ {
        self.selected.iter().copied()
    }

    /// Selected entries, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &'static KextInfo> + '_ {
        self.ids().map(KextId::info)
    }

    /// Selected names, in catalog order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|k| k.name).collect()
    }

    /// Requests that were not honoured.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedKext] {
        &self.skipped
    }

    /// Number of selected kexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Returns `true` if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn sonoma() -> KextSelection {
        KextSelection::new(DarwinVersion::new(23, 0, 0), false)
    }

    #[test]
    fn starts_from_required_kexts() {
        let s = sonoma();
        assert_eq!(s.names(), ["Lilu", "VirtualSMC"]);
    }

    #[test]
    fn requirements_are_pulled_in() {
        let mut s = sonoma();
        assert!(s.check_kext("RealtekCardReaderFriend"));
        assert!(s.contains("RealtekCardReader"));
        assert!(s.check_kext("SMCAMDProcessor"));
        assert!(s.contains("AMDRyzenCPUPowerManagement"));
    }

    #[test]
    fn out_of_window_kexts_are_skipped_unless_allowed() {
        let mut s = sonoma();
        assert!(!s.check_kext("BrcmPatchRAM2"));
        assert_eq!(s.skipped()[0].reason, SkipReason::Unsupported { min: 17, max: Some(18) });
        assert!(!s.check_kext("NoSuchKext"));
        assert_eq!(s.skipped().len(), 2);

        let mut lax = KextSelection::new(DarwinVersion::new(23, 0, 0), true);
        assert!(lax.check_kext("BrcmPatchRAM2"));
        assert!(lax.contains("BrcmFirmwareData"));
    }

    #[test]
    fn later_requests_evict_their_group() {
        let mut s = sonoma();
        s.check_kext("itlwm");
        s.check_kext("AirportItlwm");
        assert!(s.contains("AirportItlwm"));
        assert!(!s.contains("itlwm"));

        s.check_kext("CpuTscSync");
        s.check_kext("ForgedInvariant");
        assert_eq!(s.iter().filter(|k| k.conflict_group == Some(catalog::groups::TSC)).count(), 1);
    }
}
