//! `ocforge-acpigen` --- the ACPI patch generator.
//!
//! Every entry of [`patches::CATALOG`] inspects the loaded firmware tables
//! ([`ocforge_acpi::AcpiTables`]) and the hardware report, and either
//! declines (`Ok(None)`) or returns a [`PatchResult`]: SSDT sources to
//! compile, raw tables to drop in, firmware tables to delete and binary
//! find/replace renames. A result is a transaction. If its SSDT fails to
//! compile, the SSDT and every rename that depends on it are emitted
//! disabled together.
//!
//! [`run`] drives the selected catalog entries and collects an
//! [`AcpiOutput`]; [`apply_acpi_patches`] folds that into `config.plist`.

#![warn(missing_docs)]

pub mod apply;
pub mod context;
pub mod lookup;
pub mod patches;
pub mod result;
pub mod select;
pub mod ssdt;

use std::collections::BTreeSet;
use std::path::Path;

use ocforge_core::ExternalTools;

pub use apply::apply_acpi_patches;
pub use context::GenContext;
pub use patches::{AcpiPatch, CATALOG};
pub use result::{AcpiOutput, PatchResult, RawTable};
pub use select::{apply_overrides, default_selection};
pub use ssdt::{Ssdt, write_ssdt};

/// Errors raised by patch functions.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// A table lookup or byte search failed.
    #[error(transparent)]
    Acpi(#[from] ocforge_acpi::AcpiError),
    /// The compiler could not be run.
    #[error(transparent)]
    Tool(#[from] ocforge_core::ToolError),
    /// The firmware already carries the rename this patch would add.
    #[error("`{0}` already has an XSTA method; the patch has been applied before")]
    AlreadyPatched(String),
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

impl GenError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io { path: path.to_path_buf(), source }
    }
}

/// Runs every selected catalog entry and commits its result into `acpi_dir`.
///
/// A failing patch function is logged and skipped; it never aborts the run.
/// DSDT pre-patches applied at load time are carried into the output so the
/// firmware sees the same bytes on every boot.
pub fn run(
    ctx: &GenContext<'_>,
    selected: &BTreeSet<String>,
    acpi_dir: &Path,
    tools: &dyn ExternalTools,
) -> AcpiOutput {
    let mut output = AcpiOutput::default();
    output.patch.extend(ctx.tables.prepatches().iter().cloned().map(ocforge_acpi::Patch::prerequisite));

    for patch in CATALOG.iter().filter(|p| selected.contains(p.name)) {
        match (patch.function)(ctx) {
            Ok(Some(result)) if !result.is_empty() => {
                if let Err(e) = result.commit(patch.name, acpi_dir, tools, &mut output) {
                    log::warn!("{}: could not write results: {e}", patch.name);
                    output.failed.push(patch.name.to_string());
                }
            }
            Ok(_) => log::debug!("{}: not applicable", patch.name),
            Err(GenError::AlreadyPatched(path)) => {
                log::info!("{}: skipped, {path} is already patched", patch.name);
            }
            Err(e) => {
                log::warn!("{}: {e}", patch.name);
                output.failed.push(patch.name.to_string());
            }
        }
    }
    output
}
