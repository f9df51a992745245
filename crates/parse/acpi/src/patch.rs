//! `ACPI.Add`, `ACPI.Delete` and `ACPI.Patch` records.

use crate::AcpiError;
use crate::bytes::{bytes_to_hex, hex_to_bytes};
use crate::sdt::SdtHeader;

/// A binary find/replace patch applied by the bootloader to firmware AML.
///
/// `find` and `replace` always have equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Human-readable description; also the sort key.
    pub comment: String,
    /// Bytes to find.
    pub find: Vec<u8>,
    /// Replacement bytes.
    pub replace: Vec<u8>,
    /// Find mask (empty for none).
    pub mask: Vec<u8>,
    /// Replace mask (empty for none).
    pub replace_mask: Vec<u8>,
    /// Whether the bootloader applies it.
    pub enabled: bool,
    /// Restrict to tables with this signature.
    pub table_signature: Option<[u8; 4]>,
    /// Restrict to tables with this OEM table id.
    pub oem_table_id: Option<[u8; 8]>,
    /// Number of occurrences to patch (0 = all).
    pub count: u32,
    /// Maximum number of bytes to search (0 = whole table).
    pub limit: u32,
    /// Number of occurrences to skip.
    pub skip: u32,
    /// Ordering rank; prerequisite renames carry rank 0.
    pub rank: u8,
    /// Rename meant to hit every occurrence rather than a single padded site.
    pub global: bool,
}

/// Default ordering rank for ordinary patches.
pub const DEFAULT_RANK: u8 = 1;

impl Patch {
    /// Creates an enabled, unscoped patch.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::LengthMismatch`] if the lengths differ.
    pub fn new(comment: impl Into<String>, find: Vec<u8>, replace: Vec<u8>) -> Result<Self, AcpiError> {
        let comment = comment.into();
        if find.len() != replace.len() {
            return Err(AcpiError::LengthMismatch { comment, find: find.len(), replace: replace.len() });
        }
        Ok(Self {
            comment,
            find,
            replace,
            mask: Vec::new(),
            replace_mask: Vec::new(),
            enabled: true,
            table_signature: None,
            oem_table_id: None,
            count: 0,
            limit: 0,
            skip: 0,
            rank: DEFAULT_RANK,
            global: false,
        })
    }

    /// [`Patch::new`] from hex strings.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidHex`] or [`AcpiError::LengthMismatch`].
    pub fn from_hex(comment: impl Into<String>, find: &str, replace: &str) -> Result<Self, AcpiError> {
        Self::new(comment, hex_to_bytes(find)?, hex_to_bytes(replace)?)
    }

    /// A rename whose find/replace are wrapped in the same context bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::LengthMismatch`] if `from` and `to` differ in length.
    pub fn padded(
        comment: impl Into<String>,
        left: &[u8],
        from: &[u8],
        to: &[u8],
        right: &[u8],
    ) -> Result<Self, AcpiError> {
        let wrap = |mid: &[u8]| [left, mid, right].concat();
        Self::new(comment, wrap(from), wrap(to))
    }

    /// Marks the patch disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Marks the patch as an intentional all-occurrence rename.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Marks the patch as a prerequisite that must sort before others.
    #[must_use]
    pub fn prerequisite(mut self) -> Self {
        self.rank = 0;
        self
    }

    /// Restricts the patch to a table signature.
    #[must_use]
    pub fn in_table(mut self, signature: [u8; 4]) -> Self {
        self.table_signature = Some(signature);
        self
    }

    /// Uppercase hex of [`Patch::find`].
    #[must_use]
    pub fn find_hex(&self) -> String {
        bytes_to_hex(&self.find)
    }

    /// Uppercase hex of [`Patch::replace`].
    #[must_use]
    pub fn replace_hex(&self) -> String {
        bytes_to_hex(&self.replace)
    }
}

/// An `ACPI.Delete` entry dropping a firmware table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Description.
    pub comment: String,
    /// Drop every matching table, not just the first.
    pub all: bool,
    /// Whether the bootloader applies it.
    pub enabled: bool,
    /// OEM table id to match (all zero = any).
    pub oem_table_id: [u8; 8],
    /// Table length to match (0 = any).
    pub table_length: u32,
    /// Table signature to match.
    pub table_signature: [u8; 4],
}

impl DeleteEntry {
    /// Drops exactly the table described by `header`.
    #[must_use]
    pub fn for_table(comment: impl Into<String>, header: &SdtHeader) -> Self {
        Self {
            comment: comment.into(),
            all: false,
            enabled: true,
            oem_table_id: header.oem_table_id,
            table_length: header.length,
            table_signature: header.signature,
        }
    }
}

/// An `ACPI.Add` entry loading a generated SSDT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddEntry {
    /// Description.
    pub comment: String,
    /// Whether the bootloader loads it.
    pub enabled: bool,
    /// File name under `EFI/OC/ACPI`.
    pub path: String,
}
