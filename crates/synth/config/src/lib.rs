//! `ocforge-config` --- filling in `config.plist`.
//!
//! [`assemble`] takes the template, the hardware report and the kext
//! selection and writes every section the ACPI generator does not own:
//! Booter, `DeviceProperties`, Kernel (minus `Add`/`Block`), Misc, NVRAM,
//! `PlatformInfo` and UEFI. SMBIOS identities come from [`smbios`].

#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use rand::Rng;

use ocforge_core::DarwinVersion;
use ocforge_hardware::compat::DeviceCompat;
use ocforge_hardware::ids::cpu::IntelGen;
use ocforge_hardware::{CpuVendor, HardwareReport};
use ocforge_kext::KextSelection;

mod booter;
mod devices;
pub mod dict;
mod kernel;
mod misc;
pub mod models;
pub mod nvram;
pub mod patches;
mod platform;
pub mod skeleton;
pub mod smbios;
mod uefi;

pub use patches::KernelPatchSet;
pub use smbios::SmbiosIdentity;

/// Picker theme used when the settings do not name one.
pub const DEFAULT_PICKER_VARIANT: &str = "Acidanthera\\GoldenGate";

/// Errors raised while assembling the config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A plist could not be read or written.
    #[error("{}: {source}", path.display())]
    Plist {
        /// The plist.
        path: PathBuf,
        /// Parser error.
        source: plist::Error,
    },
    /// The config template is not a dictionary.
    #[error("{}: top level is not a dictionary", .0.display())]
    NotADictionary(PathBuf),
    /// A kernel patch set is malformed.
    #[error("kernel patch set: {0}")]
    PatchSet(String),
    /// A saved SMBIOS identity is malformed.
    #[error("{}: {source}", path.display())]
    Smbios {
        /// The identity file.
        path: PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },
}

/// User choices that shape the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    /// `Misc.Boot.PickerVariant`.
    pub picker_variant: String,
    /// Name shown in About This Mac, through `RestrictEvents`.
    pub custom_cpu_name: Option<String>,
    /// Intel TSC patches are needed.
    pub tsc_sync: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self { picker_variant: DEFAULT_PICKER_VARIANT.to_string(), custom_cpu_name: None, tsc_sync: false }
    }
}

/// Everything [`assemble`] reads.
#[derive(Debug, Clone, Copy)]
pub struct ConfigInput<'a> {
    /// The machine.
    pub report: &'a HardwareReport,
    /// Target macOS.
    pub target: DarwinVersion,
    /// Devices hidden from macOS.
    pub disabled: &'a [DeviceCompat],
    /// Kexts chosen for the build.
    pub kexts: &'a KextSelection,
    /// SMBIOS identity.
    pub smbios: &'a SmbiosIdentity,
    /// Fetched AMD kernel patches, if the CPU needs them.
    pub amd_patches: Option<&'a KernelPatchSet>,
    /// User choices.
    pub options: &'a ConfigOptions,
}

impl ConfigInput<'_> {
    pub(crate) fn major(&self) -> u32 {
        self.target.major
    }

    pub(crate) fn is_amd(&self) -> bool {
        self.report.cpu.manufacturer == CpuVendor::Amd
    }

    pub(crate) fn intel_gen(&self) -> Option<IntelGen> {
        if self.is_amd() { None } else { IntelGen::from_codename(&self.report.cpu.codename) }
    }

    pub(crate) fn is_laptop(&self) -> bool {
        self.report.is_laptop()
    }

    pub(crate) fn kept(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d.name == name)
    }

    pub(crate) fn board_is(&self, vendor: &str) -> bool {
        self.report.motherboard.name.to_ascii_uppercase().contains(vendor)
    }
}

/// Fills every section of `config` this crate owns.
///
/// `rng` picks the audio layout; pass a seeded generator for reproducible
/// output.
pub fn assemble<R: Rng + ?Sized>(config: &mut Dictionary, input: &ConfigInput<'_>, rng: &mut R) {
    skeleton::ensure_skeleton(config);
    booter::fill(config, input);
    devices::fill(config, input);
    kernel::fill(config, input);
    misc::fill(config, input);
    nvram::fill(config, input, rng);
    platform::fill(config, input);
    uefi::fill(config, input);
    log::info!("config assembled for Darwin {}", input.target);
}

/// Reads `config.plist`.
///
/// # Errors
///
/// Fails if the file is unreadable or its top level is not a dictionary.
pub fn read_config(path: &Path) -> Result<Dictionary, ConfigError> {
    let value = Value::from_file(path).map_err(|source| ConfigError::Plist { path: path.to_path_buf(), source })?;
    match value {
        Value::Dictionary(dict) => Ok(dict),
        _ => Err(ConfigError::NotADictionary(path.to_path_buf())),
    }
}

/// Writes `config` as XML.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn write_config(path: &Path, config: &Dictionary) -> Result<(), ConfigError> {
    Value::Dictionary(config.clone())
        .to_file_xml(path)
        .map_err(|source| ConfigError::Plist { path: path.to_path_buf(), source })
}
