//! User settings from `ocforge.toml`.
//!
//! Every key is optional. Relative paths are resolved against the directory
//! holding the settings file, or the report's directory when there is none.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ocforge_config::{ConfigOptions, DEFAULT_PICKER_VARIANT};

/// Settings filename looked up next to the report.
pub const SETTINGS_FILE: &str = "ocforge.toml";

/// Parsed settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// `Misc.Boot.PickerVariant`; also picks the image set kept by pruning.
    pub picker_variant: String,
    /// Reuse `<output>/smbios.json` instead of generating new serials.
    pub preserve_smbios: bool,
    /// Let the default target be a beta release.
    pub include_beta: bool,
    /// Keep kexts whose support window excludes the target.
    pub allow_unsupported_kexts: bool,
    /// Download cache.
    pub cache_dir: Option<PathBuf>,
    /// Where the EFI folder is written.
    pub output_dir: Option<PathBuf>,
    /// Local directory holding kexts that have no upstream release.
    pub extras_dir: Option<PathBuf>,
    /// Directory searched for `iasl` and `macserial` before `PATH`.
    pub tools_dir: Option<PathBuf>,
    /// Report device names to hide from macOS.
    pub disabled_devices: Vec<String>,
    /// Processor name shown in About This Mac.
    pub custom_cpu_name: Option<String>,
    /// Mac model to use instead of the automatic pick.
    pub smbios_model: Option<String>,
    /// Target macOS instead of the newest supported one.
    pub macos_version: Option<String>,
    /// The CPU cores need TSC synchronisation.
    pub tsc_sync: bool,
    /// ACPI patches to add to the default selection.
    pub enable_acpi_patches: Vec<String>,
    /// ACPI patches to drop from the default selection.
    pub disable_acpi_patches: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            picker_variant: DEFAULT_PICKER_VARIANT.to_string(),
            preserve_smbios: false,
            include_beta: false,
            allow_unsupported_kexts: false,
            cache_dir: None,
            output_dir: None,
            extras_dir: None,
            tools_dir: None,
            disabled_devices: Vec::new(),
            custom_cpu_name: None,
            smbios_model: None,
            macos_version: None,
            tsc_sync: false,
            enable_acpi_patches: Vec::new(),
            disable_acpi_patches: Vec::new(),
        }
    }
}

/// Settings plus the directory relative paths are resolved against.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    /// The settings.
    pub settings: Settings,
    /// Base for relative paths.
    pub base: PathBuf,
    /// File the settings came from, if any.
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Parses TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid settings")
    }

    /// Options for the config assembler.
    pub fn config_options(&self) -> ConfigOptions {
        ConfigOptions {
            picker_variant: self.picker_variant.clone(),
            custom_cpu_name: self.custom_cpu_name.clone(),
            tsc_sync: self.tsc_sync,
        }
    }
}

/// Loads `explicit`, or `ocforge.toml` next to `report` if present, or the
/// defaults.
pub fn load(explicit: Option<&Path>, report: Option<&Path>) -> Result<LoadedSettings> {
    let report_dir = report
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => Some(report_dir.join(SETTINGS_FILE)).filter(|p| p.is_file()),
    };
    let Some(path) = path else {
        return Ok(LoadedSettings { settings: Settings::default(), base: report_dir, source: None });
    };

    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let settings = Settings::parse(&text).with_context(|| format!("in {}", path.display()))?;
    let base = path.parent().filter(|p| !p.as_os_str().is_empty()).map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    log::debug!("settings from {}", path.display());
    Ok(LoadedSettings { settings, base, source: Some(path) })
}

impl LoadedSettings {
    fn resolve(&self, path: Option<&PathBuf>, default: &str) -> PathBuf {
        match path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.base.join(p),
            None => self.base.join(default),
        }
    }

    /// Output directory; the EFI folder goes in `<output>/EFI`.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(self.settings.output_dir.as_ref(), "Results")
    }

    /// Download cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(self.settings.cache_dir.as_ref(), ".ocforge-cache")
    }

    /// Extras directory, if configured.
    pub fn extras_dir(&self) -> Option<PathBuf> {
        self.settings.extras_dir.as_ref().map(|p| self.resolve(Some(p), ""))
    }

    /// Tools directory, if configured.
    pub fn tools_dir(&self) -> Option<PathBuf> {
        self.settings.tools_dir.as_ref().map(|p| self.resolve(Some(p), ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.picker_variant, "Acidanthera\\GoldenGate");
    }

    #[test]
    fn parses_every_key() {
        let settings = Settings::parse(
            r#"
            picker_variant = "Acidanthera\\Syrah"
            preserve_smbios = true
            include_beta = true
            allow_unsupported_kexts = true
            cache_dir = "/var/cache/ocforge"
            output_dir = "out"
            disabled_devices = ["NVIDIA GeForce GTX 1650"]
            custom_cpu_name = "Intel Core i9"
            smbios_model = "iMacPro1,1"
            macos_version = "Sonoma"
            tsc_sync = true
            enable_acpi_patches = ["RTCAWAC"]
            disable_acpi_patches = ["PMC"]
            "#,
        )
        .unwrap();
        assert!(settings.preserve_smbios && settings.include_beta && settings.tsc_sync);
        assert_eq!(settings.disabled_devices, ["NVIDIA GeForce GTX 1650"]);
        assert_eq!(settings.smbios_model.as_deref(), Some("iMacPro1,1"));
        assert_eq!(settings.config_options().custom_cpu_name.as_deref(), Some("Intel Core i9"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::parse("picker = 1").is_err());
    }

    #[test]
    fn paths_resolve_against_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("Report.json");
        std::fs::write(dir.path().join(SETTINGS_FILE), "output_dir = \"efi-out\"\ncache_dir = \"/tmp/c\"\n").unwrap();

        let loaded = load(None, Some(&report)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(dir.path().join(SETTINGS_FILE).as_path()));
        assert_eq!(loaded.output_dir(), dir.path().join("efi-out"));
        assert_eq!(loaded.cache_dir(), PathBuf::from("/tmp/c"));
    }

    #[test]
    fn missing_file_falls_back_to_the_report_directory() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(None, Some(&dir.path().join("Report.json"))).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.output_dir(), dir.path().join("Results"));
        assert_eq!(loaded.cache_dir(), dir.path().join(".ocforge-cache"));
    }
}
