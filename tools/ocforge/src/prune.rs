//! Removing OpenCore assets the config does not reference.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plist::{Dictionary, Value};

use ocforge_config::dict::get;

/// Files and directories [`prune`] removed.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Removed paths, relative to `EFI/OC`.
    pub removed: Vec<PathBuf>,
}

/// `Path` values of an array of entries, lowercased.
fn referenced(config: &Dictionary, keys: &[&str]) -> BTreeSet<String> {
    get(config, keys)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.as_dictionary()?.get("Path")?.as_string())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn remove(path: &Path, oc: &Path, report: &mut PruneReport) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("removing {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
    }
    report.removed.push(path.strip_prefix(oc).unwrap_or(path).to_path_buf());
    Ok(())
}

/// Deletes every file directly in `dir` whose name is not in `keep`.
fn prune_listed(dir: &Path, keep: &BTreeSet<String>, oc: &Path, report: &mut PruneReport) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let name = path.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
        if path.is_file() && !keep.contains(&name) {
            remove(&path, oc, report)?;
        }
    }
    Ok(())
}

/// Keeps `Resources/Image/<vendor>/<set>` for the picker variant only.
fn prune_images(images: &Path, variant: &str, oc: &Path, report: &mut PruneReport) -> Result<()> {
    if !images.is_dir() {
        return Ok(());
    }
    let wanted: Vec<&str> = variant.split(['\\', '/']).collect();
    let [vendor, set] = wanted.as_slice() else {
        log::info!("PickerVariant {variant}: keeping every image set");
        return Ok(());
    };
    for entry in fs::read_dir(images).with_context(|| format!("reading {}", images.display()))? {
        let vendor_dir = entry?.path();
        if !vendor_dir.is_dir() {
            continue;
        }
        if vendor_dir.file_name().is_none_or(|n| n.to_string_lossy() != *vendor) {
            remove(&vendor_dir, oc, report)?;
            continue;
        }
        for set_entry in fs::read_dir(&vendor_dir).with_context(|| format!("reading {}", vendor_dir.display()))? {
            let set_dir = set_entry?.path();
            if set_dir.is_dir() && set_dir.file_name().is_none_or(|n| n.to_string_lossy() != *set) {
                remove(&set_dir, oc, report)?;
            }
        }
    }
    Ok(())
}

/// Prunes `Drivers`, `Tools`, `Resources/Audio` and `Resources/Image`
/// under `oc` (the `EFI/OC` directory) to what `config` uses.
pub fn prune(oc: &Path, config: &Dictionary) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    prune_listed(&oc.join("Drivers"), &referenced(config, &["UEFI", "Drivers"]), oc, &mut report)?;
    prune_listed(&oc.join("Tools"), &referenced(config, &["Misc", "Tools"]), oc, &mut report)?;

    let audio = get(config, &["UEFI", "Audio", "AudioSupport"]).and_then(Value::as_boolean).unwrap_or(false);
    if !audio {
        prune_listed(&oc.join("Resources").join("Audio"), &BTreeSet::new(), oc, &mut report)?;
    }

    let variant = get(config, &["Misc", "Boot", "PickerVariant"]).and_then(Value::as_string).unwrap_or("Auto");
    prune_images(&oc.join("Resources").join("Image"), variant, oc, &mut report)?;

    log::info!("pruned {} unused assets", report.removed.len());
    Ok(report)
}
