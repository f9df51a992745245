//! Copying selected bundles into `EFI/OC/Kexts`.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::KextError;
use crate::resolve::KextSelection;

/// What [`install`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Bundles copied.
    pub installed: Vec<String>,
    /// Selected kexts with no bundle in the source directory.
    pub missing: Vec<String>,
}

/// Recursively copies `src` to `dst`, creating directories as needed.
///
/// # Errors
///
/// Fails on the first walk, mkdir or copy error.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), KextError> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else { continue };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(KextError::io(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(KextError::io(&target))?;
        }
    }
    Ok(())
}

/// Locates `<name>.kext` anywhere under `source_dir`, outside any bundle's
/// `PlugIns`. Release archives nest bundles at varying depths.
fn find_bundle(source_dir: &Path, name: &str) -> Option<PathBuf> {
    let wanted = format!("{name}.kext");
    let mut walker = WalkDir::new(source_dir).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name.eq_ignore_ascii_case(&wanted) {
            return Some(entry.into_path());
        }
        if file_name.ends_with(".kext") || file_name == "dSYM" || file_name.ends_with(".dSYM") {
            walker.skip_current_dir();
        }
    }
    None
}

/// Copies every selected top-level bundle from `source_dir` into
/// `kexts_dir`. Plugins arrive with their parent.
///
/// # Errors
///
/// Fails on I/O errors. Missing bundles are reported, not errors.
pub fn install(selection: &KextSelection, source_dir: &Path, kexts_dir: &Path) -> Result<InstallReport, KextError> {
    fs::create_dir_all(kexts_dir).map_err(KextError::io(kexts_dir))?;
    let mut report = InstallReport::default();
    for info in selection.iter().filter(|k| k.parent.is_none()) {
        let Some(src) = find_bundle(source_dir, info.name) else {
            log::warn!("{}: no bundle under {}", info.name, source_dir.display());
            report.missing.push(info.name.to_string());
            continue;
        };
        let dst = kexts_dir.join(format!("{}.kext", info.name));
        if dst.exists() {
            fs::remove_dir_all(&dst).map_err(KextError::io(&dst))?;
        }
        copy_tree(&src, &dst)?;
        log::debug!("installed {} from {}", info.name, src.display());
        report.installed.push(info.name.to_string());
    }
    Ok(report)
}
