//! Darwin kernel version triples.
//!
//! Every OS constraint in the system (kext windows, device support ranges,
//! `MinKernel`/`MaxKernel`) is a [`DarwinVersion`]. Ordering is the plain
//! lexicographic order of the triple.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Darwin kernel version such as `22.4.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DarwinVersion {
    /// Major version (`22` for Ventura).
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

/// Error returned when a Darwin version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Darwin version `{0}`")]
pub struct ParseDarwinError(pub String);

impl DarwinVersion {
    /// Construct a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// The first version of a major release (`<major>.0.0`).
    #[must_use]
    pub const fn major_floor(major: u32) -> Self {
        Self::new(major, 0, 0)
    }

    /// The last version of a major release (`<major>.99.99`).
    #[must_use]
    pub const fn major_ceiling(major: u32) -> Self {
        Self::new(major, 99, 99)
    }

    /// Parse an optional bound: the empty string means "no bound".
    ///
    /// # Errors
    ///
    /// Returns [`ParseDarwinError`] if the string is non-empty and malformed.
    pub fn parse_bound(s: &str) -> Result<Option<Self>, ParseDarwinError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    /// Returns `true` if `self` lies in the inclusive window `[min, max]`,
    /// where a missing bound is unbounded.
    #[must_use]
    pub fn within(self, min: Option<Self>, max: Option<Self>) -> bool {
        min.is_none_or(|m| m <= self) && max.is_none_or(|m| self <= m)
    }
}

impl FromStr for DarwinVersion {
    type Err = ParseDarwinError;

    /// Accepts `22`, `22.4` and `22.4.0`; partial forms are zero-filled
    /// before being handed to `semver`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let dots = trimmed.matches('.').count();
        let normalised = match dots {
            0 => format!("{trimmed}.0.0"),
            1 => format!("{trimmed}.0"),
            _ => trimmed.to_string(),
        };
        let v = semver::Version::parse(&normalised).map_err(|_| ParseDarwinError(s.to_string()))?;
        let component = |n: u64| u32::try_from(n).map_err(|_| ParseDarwinError(s.to_string()));
        Ok(Self::new(component(v.major)?, component(v.minor)?, component(v.patch)?))
    }
}

impl fmt::Display for DarwinVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for DarwinVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DarwinVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_partial_forms() {
        assert_eq!("22.0.0".parse::<DarwinVersion>().unwrap(), DarwinVersion::new(22, 0, 0));
        assert_eq!("23.4".parse::<DarwinVersion>().unwrap(), DarwinVersion::new(23, 4, 0));
        assert_eq!("19".parse::<DarwinVersion>().unwrap(), DarwinVersion::new(19, 0, 0));
        assert!("twenty".parse::<DarwinVersion>().is_err());
    }

    #[test]
    fn ordering_is_lexicographic_on_the_triple() {
        let a = DarwinVersion::new(19, 99, 99);
        let b = DarwinVersion::new(20, 0, 0);
        let c = DarwinVersion::new(20, 0, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn empty_bound_is_unbounded() {
        let v = DarwinVersion::new(23, 0, 0);
        assert_eq!(DarwinVersion::parse_bound("").unwrap(), None);
        assert!(v.within(None, None));
        assert!(v.within(Some(DarwinVersion::major_floor(23)), Some(DarwinVersion::major_ceiling(23))));
        assert!(!v.within(None, Some(DarwinVersion::major_ceiling(22))));
    }
}
