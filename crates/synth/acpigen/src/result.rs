//! Patch results and how they are committed to disk.

use std::path::Path;

use ocforge_acpi::{AddEntry, DeleteEntry, Patch};
use ocforge_core::ExternalTools;

use crate::GenError;
use crate::ssdt::{Ssdt, write_ssdt};

/// A ready-made binary table written verbatim (the corrected `APIC`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// File stem.
    pub name: String,
    /// `ACPI.Add` comment.
    pub comment: String,
    /// Table bytes, checksum included.
    pub bytes: Vec<u8>,
}

/// What one patch function wants done.
///
/// The parts stand or fall together: a rename of `_STA` to `XSTA` is useless
/// without the SSDT that defines the replacement `_STA`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchResult {
    /// SSDTs to compile and load.
    pub ssdts: Vec<Ssdt>,
    /// Binary tables to load.
    pub tables: Vec<RawTable>,
    /// Firmware tables to drop.
    pub delete: Vec<DeleteEntry>,
    /// Find/replace renames.
    pub patch: Vec<Patch>,
}

impl PatchResult {
    /// A result carrying one SSDT.
    #[must_use]
    pub fn with_ssdt(ssdt: Ssdt) -> Self {
        Self { ssdts: vec![ssdt], ..Self::default() }
    }

    /// Returns `true` if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ssdts.is_empty() && self.tables.is_empty() && self.delete.is_empty() && self.patch.is_empty()
    }

    /// Writes and compiles every SSDT and writes every raw table, then
    /// folds the records into `out`.
    ///
    /// If any SSDT fails to compile, every record of this result is
    /// emitted disabled and `name` is added to [`AcpiOutput::failed`].
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Io`] or [`GenError::Tool`] when a file cannot be
    /// written or the compiler cannot be run.
    pub fn commit(
        self,
        name: &str,
        acpi_dir: &Path,
        tools: &dyn ExternalTools,
        out: &mut AcpiOutput,
    ) -> Result<bool, GenError> {
        let mut ok = true;
        let mut adds = Vec::new();
        for ssdt in &self.ssdts {
            ok &= write_ssdt(acpi_dir, &ssdt.name, &ssdt.source, tools, true)?;
            adds.push(AddEntry { comment: ssdt.comment.clone(), enabled: true, path: format!("{}.aml", ssdt.name) });
        }
        for table in &self.tables {
            std::fs::create_dir_all(acpi_dir).map_err(GenError::io(acpi_dir))?;
            let path = acpi_dir.join(format!("{}.aml", table.name));
            std::fs::write(&path, &table.bytes).map_err(GenError::io(&path))?;
            adds.push(AddEntry { comment: table.comment.clone(), enabled: true, path: format!("{}.aml", table.name) });
        }

        let mut delete = self.delete;
        let mut patch = self.patch;
        if ok {
            log::info!("{name}: {} table(s), {} delete(s), {} patch(es)", adds.len(), delete.len(), patch.len());
        } else {
            log::warn!("{name}: SSDT failed to compile, disabling its records");
            adds.iter_mut().for_each(|a| a.enabled = false);
            delete.iter_mut().for_each(|d| d.enabled = false);
            patch.iter_mut().for_each(|p| p.enabled = false);
            out.failed.push(name.to_string());
        }
        out.add.extend(adds);
        out.delete.extend(delete);
        out.patch.extend(patch);
        Ok(ok)
    }
}

/// Everything the generator hands to the config assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcpiOutput {
    /// `ACPI.Add`.
    pub add: Vec<AddEntry>,
    /// `ACPI.Delete`.
    pub delete: Vec<DeleteEntry>,
    /// `ACPI.Patch`, unsorted.
    pub patch: Vec<Patch>,
    /// Names of patches whose output was disabled or dropped.
    pub failed: Vec<String>,
}
