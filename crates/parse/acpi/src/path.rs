//! ACPI name segments and absolute namespace paths.
//!
//! AML stores every name as a 4-byte segment padded with `_` (`EC__`), while
//! disassembled source prints the short form (`EC`). [`NameSeg`] always
//! holds the padded bytes so paths compare equal regardless of how the
//! source spelled them.

use std::fmt;
use std::str::FromStr;

/// A 4-byte AML name segment (e.g., `_SB_`, `PCI0`, `_HID`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameSeg(pub [u8; 4]);

impl NameSeg {
    /// Create a `NameSeg` from a 4-byte slice.
    ///
    /// Returns `None` if the slice is shorter than 4 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let seg: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(seg))
    }

    /// Parse an ASL name (`EC`, `_SB`, `PCI0`), padding it to four bytes.
    ///
    /// Returns `None` for empty, over-long or non-ASCII-alphanumeric names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty()
            || bytes.len() > 4
            || bytes[0].is_ascii_digit()
            || !bytes.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
        {
            return None;
        }
        let mut seg = [b'_'; 4];
        seg[..bytes.len()].copy_from_slice(bytes);
        Some(Self(seg))
    }

    /// Returns the padded name as a string (ACPI names are always ASCII).
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    /// Returns the name with trailing padding removed, as iasl prints it.
    #[must_use]
    pub fn short(&self) -> &str {
        let s = self.as_str();
        let trimmed = s.trim_end_matches('_');
        if trimmed.is_empty() { &s[..1] } else { trimmed }
    }
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg(\"{}\")", self.as_str())
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// An absolute ACPI namespace path.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcpiPath {
    segments: Vec<NameSeg>,
}

impl AcpiPath {
    /// The root path (`\`).
    #[must_use]
    pub const fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Returns the segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    /// Returns the number of segments (depth) in this path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<NameSeg> {
        self.segments.last().copied()
    }

    /// The enclosing scope.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self { segments: rest.to_vec() })
    }

    /// A child path.
    #[must_use]
    pub fn join(&self, seg: NameSeg) -> Self {
        let mut segments = self.segments.clone();
        segments.push(seg);
        Self { segments }
    }

    /// Returns `true` if `self` is `other` or lies beneath it.
    #[must_use]
    pub fn starts_with(&self, other: &Self) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Resolves an ASL name relative to `scope`.
    ///
    /// Handles absolute names (`\_SB.PCI0`), parent prefixes (`^^LPCB`) and
    /// dotted relative names (`PCI0.LPCB`).
    #[must_use]
    pub fn resolve(scope: &Self, name: &str) -> Option<Self> {
        let name = name.trim();
        let (mut base, rest) = if let Some(abs) = name.strip_prefix('\\') {
            (Self::root(), abs)
        } else {
            let carets = name.bytes().take_while(|&b| b == b'^').count();
            let mut base = scope.clone();
            for _ in 0..carets {
                base = base.parent()?;
            }
            (base, &name[carets..])
        };
        if rest.is_empty() {
            return Some(base);
        }
        for part in rest.split('.') {
            base.segments.push(NameSeg::from_name(part)?);
        }
        Some(base)
    }
}

impl FromStr for AcpiPath {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(&Self::root(), s).ok_or(())
    }
}

impl fmt::Debug for AcpiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AcpiPath({self})")
    }
}

impl fmt::Display for AcpiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
