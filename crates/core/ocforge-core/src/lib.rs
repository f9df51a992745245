//! `ocforge-core` --- primitives shared by every ocforge crate.
//!
//! This crate owns the pieces that the ACPI generator, the kext resolver and
//! the config assembler all need to agree on:
//!
//! - [`DarwinVersion`], the `(major, minor, patch)` kernel version triple
//!   that every OS window in the system is expressed in.
//! - The compiled-in macOS release table ([`os`]), including the "latest"
//!   and "lowest" bounds used to elide `MinKernel`/`MaxKernel`.
//! - The [`ExternalTools`] interface through which the ACPI compiler
//!   (`iasl`) and the SMBIOS serial generator (`macserial`) are reached.

#![warn(missing_docs)]

pub mod darwin;
pub mod os;
pub mod tools;

pub use darwin::DarwinVersion;
pub use os::OsRelease;
pub use tools::{CompileOutcome, Disassembly, ExternalTools, ProcessTools, ToolError};
