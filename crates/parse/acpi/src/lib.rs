//! `ocforge-acpi` --- a host-side index over a machine's dumped ACPI tables.
//!
//! This crate loads raw AML tables from disk, disassembles them through the
//! external compiler into mixed listings (ASL source interleaved with the AML
//! bytes that encode it), and builds the lookups the patch generator needs:
//! device, method, name and processor paths, lexical scopes, and the mapping
//! from a source line back to its byte offset in the raw table.
//!
//! Byte-level helpers live in [`bytes`]: hex conversion, occurrence counting
//! across every loaded table and the shortest-unique-pad search used to make
//! binary find/replace patches hit exactly one site.
//!
//! # Usage
//!
//! ```ignore
//! let mut tables = AcpiTables::default();
//! let report = tables.load(Path::new("ACPI/"), &ProcessTools::default())?;
//! for entry in tables.get_device_paths_with_hid("PNP0C09", None) {
//!     println!("{} at line {}", entry.path, entry.line);
//! }
//! ```

#![warn(missing_docs)]

pub mod bytes;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
pub mod listing;
pub mod madt;
pub mod patch;
pub mod path;
pub mod prepatch;
pub mod resource;
pub mod sdt;
pub mod table;
pub mod tables;

pub use bytes::{AmlCorpus, hex_to_bytes, int_to_hex, to_little_endian_hex};
pub use madt::{MadtEntry, MadtEntryIter};
pub use patch::{AddEntry, DeleteEntry, Patch};
pub use path::{AcpiPath, NameSeg};
pub use resource::{SmallResource, SmallResourceIter};
pub use sdt::SdtHeader;
pub use table::{AcpiTable, HexBlock, ObjectKind, PathEntry};
pub use tables::{AcpiTables, LoadReport};

/// Errors that can occur while loading or querying ACPI tables.
#[derive(Debug, thiserror::Error)]
pub enum AcpiError {
    /// A table was too short to contain the expected data.
    #[error("table `{0}` is truncated")]
    TruncatedData(String),
    /// The table checksum did not validate.
    #[error("table `{0}` has an invalid checksum")]
    InvalidChecksum(String),
    /// No table with the requested slot or signature is loaded.
    #[error("no table `{0}` is loaded")]
    TableNotFound(String),
    /// No pad around the pattern makes it unique inside the table bounds.
    #[error("pattern {pattern} at offset {offset:#x} in `{table}` cannot be made unique")]
    NotUnique {
        /// Hex of the pattern.
        pattern: String,
        /// Table slot.
        table: String,
        /// Byte offset the search was anchored at.
        offset: usize,
    },
    /// The pattern was not found at or after the anchor offset.
    #[error("pattern {pattern} not found after offset {offset:#x} in `{table}`")]
    PatternNotFound {
        /// Hex of the pattern.
        pattern: String,
        /// Table slot.
        table: String,
        /// Byte offset the search was anchored at.
        offset: usize,
    },
    /// A find/replace pair had different lengths.
    #[error("patch `{comment}`: find is {find} bytes but replace is {replace}")]
    LengthMismatch {
        /// Patch comment.
        comment: String,
        /// Find length.
        find: usize,
        /// Replace length.
        replace: usize,
    },
    /// A hex string could not be decoded.
    #[error("invalid hex `{0}`")]
    InvalidHex(String),
    /// The external disassembler could not be run.
    #[error(transparent)]
    Tool(#[from] ocforge_core::ToolError),
    /// Filesystem error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl AcpiError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
