//! `ocforge-kext` --- choosing, installing and listing kernel extensions.
//!
//! - [`catalog`]: the compiled-in kext table.
//! - [`rules`]: hardware predicates that request kexts.
//! - [`resolve`]: the per-build [`KextSelection`] (requirement closure,
//!   conflict groups, OS windows).
//! - [`bundle`] and [`install`]: `.kext` bundles on disk.
//! - [`emit`]: the ordered `Kernel.Add` list.

#![warn(missing_docs)]

use std::path::PathBuf;

pub mod bundle;
pub mod catalog;
pub mod emit;
pub mod install;
pub mod resolve;
pub mod rules;

pub use bundle::{KextBundle, discover};
pub use catalog::{Category, KextId, KextInfo};
pub use emit::{BlockEntry, KernelAddEntry, apply_kernel_entries, emit};
pub use install::{InstallReport, copy_tree, install};
pub use resolve::{KextSelection, SkipReason, SkippedKext};
pub use rules::{SelectOptions, SelectionOutcome, select};

/// Errors raised while handling kext bundles.
#[derive(Debug, thiserror::Error)]
pub enum KextError {
    /// Filesystem failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Directory walk failure.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    /// An `Info.plist` could not be parsed.
    #[error("{}: {source}", path.display())]
    Plist {
        /// The plist.
        path: PathBuf,
        /// Parser error.
        source: plist::Error,
    },
    /// An `Info.plist` lacks a required key.
    #[error("{}: {reason}", path.display())]
    InvalidInfoPlist {
        /// The plist.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },
}

impl KextError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
