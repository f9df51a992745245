//! The compiled-in macOS release table.
//!
//! Releases are listed oldest first. The newest entry may be a beta, in which
//! case [`latest`] and [`latest_final`] differ.

use crate::darwin::DarwinVersion;

/// One macOS release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsRelease {
    /// Marketing name (`"Sonoma"`).
    pub name: &'static str,
    /// Marketing version (`"14"`, `"10.13"`).
    pub marketing_version: &'static str,
    /// Darwin kernel major version.
    pub darwin_major: u32,
    /// Whether the release is still in beta.
    pub beta: bool,
}

impl OsRelease {
    /// The first kernel of this release.
    #[must_use]
    pub const fn floor(&self) -> DarwinVersion {
        DarwinVersion::major_floor(self.darwin_major)
    }

    /// The last possible kernel of this release.
    #[must_use]
    pub const fn ceiling(&self) -> DarwinVersion {
        DarwinVersion::major_ceiling(self.darwin_major)
    }
}

const fn release(name: &'static str, marketing_version: &'static str, darwin_major: u32, beta: bool) -> OsRelease {
    OsRelease { name, marketing_version, darwin_major, beta }
}

/// Every release the generator knows how to target.
pub const RELEASES: &[OsRelease] = &[
    release("High Sierra", "10.13", 17, false),
    release("Mojave", "10.14", 18, false),
    release("Catalina", "10.15", 19, false),
    release("Big Sur", "11", 20, false),
    release("Monterey", "12", 21, false),
    release("Ventura", "13", 22, false),
    release("Sonoma", "14", 23, false),
    release("Sequoia", "15", 24, false),
    release("Tahoe", "26", 25, true),
];

/// Returns the newest release, optionally skipping betas.
#[must_use]
pub fn newest(include_beta: bool) -> &'static OsRelease {
    RELEASES
        .iter()
        .rev()
        .find(|r| include_beta || !r.beta)
        .unwrap_or(&RELEASES[0])
}

/// The highest Darwin version any release reaches (`<major>.99.99`).
#[must_use]
pub fn latest(include_beta: bool) -> DarwinVersion {
    newest(include_beta).ceiling()
}

/// [`latest`] restricted to final releases.
#[must_use]
pub fn latest_final() -> DarwinVersion {
    latest(false)
}

/// The lowest Darwin version the generator supports.
#[must_use]
pub fn lowest() -> DarwinVersion {
    RELEASES[0].floor()
}

/// Looks up the release for a Darwin major version.
#[must_use]
pub fn by_darwin(major: u32) -> Option<&'static OsRelease> {
    RELEASES.iter().find(|r| r.darwin_major == major)
}

/// Marketing name for a Darwin version, e.g. `"Ventura"` for `22.x`.
#[must_use]
pub fn os_name(version: DarwinVersion) -> Option<&'static str> {
    by_darwin(version.major).map(|r| r.name)
}

/// Darwin floor for a marketing name (`"Sonoma"`), case-insensitive.
#[must_use]
pub fn darwin_from_name(name: &str) -> Option<DarwinVersion> {
    let name = name.trim();
    RELEASES
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name) || r.name.replace(' ', "").eq_ignore_ascii_case(name))
        .map(OsRelease::floor)
}

/// Darwin floor for a marketing version (`"14"`, `"14.2"`, `"10.15.7"`).
#[must_use]
pub fn darwin_from_marketing(version: &str) -> Option<DarwinVersion> {
    let version = version.trim();
    RELEASES
        .iter()
        .filter(|r| {
            version == r.marketing_version
                || version
                    .strip_prefix(r.marketing_version)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
        .max_by_key(|r| r.marketing_version.len())
        .map(OsRelease::floor)
}

/// Resolves a user-supplied OS selector: a name, a marketing version or a
/// Darwin version string.
#[must_use]
pub fn resolve(selector: &str) -> Option<DarwinVersion> {
    darwin_from_name(selector)
        .or_else(|| darwin_from_marketing(selector))
        .or_else(|| {
            let v: DarwinVersion = selector.parse().ok()?;
            by_darwin(v.major).map(|_| v)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_skips_beta_when_asked() {
        assert_eq!(latest(true), DarwinVersion::new(25, 99, 99));
        assert_eq!(latest(false), DarwinVersion::new(24, 99, 99));
        assert_eq!(lowest(), DarwinVersion::new(17, 0, 0));
    }

    #[test]
    fn name_and_marketing_lookups() {
        assert_eq!(darwin_from_name("sonoma"), Some(DarwinVersion::new(23, 0, 0)));
        assert_eq!(darwin_from_name("BigSur"), Some(DarwinVersion::new(20, 0, 0)));
        assert_eq!(darwin_from_marketing("10.15.7"), Some(DarwinVersion::new(19, 0, 0)));
        assert_eq!(darwin_from_marketing("14"), Some(DarwinVersion::new(23, 0, 0)));
        assert_eq!(darwin_from_marketing("1"), None);
        assert_eq!(os_name(DarwinVersion::new(22, 4, 0)), Some("Ventura"));
    }

    #[test]
    fn resolve_accepts_every_form() {
        assert_eq!(resolve("Ventura"), Some(DarwinVersion::new(22, 0, 0)));
        assert_eq!(resolve("13"), Some(DarwinVersion::new(22, 0, 0)));
        assert_eq!(resolve("23.4.0"), Some(DarwinVersion::new(23, 4, 0)));
        assert_eq!(resolve("99.0.0"), None);
    }
}
