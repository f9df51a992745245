//! Download history for skipping archives that are already cached.
//!
//! Every fetched archive is recorded under its product name together with
//! the release id it came from and the SHA-256 of the archive. A product is
//! current when the recorded id matches the upstream id and the extracted
//! directory still exists.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current schema version. Bump when the history format changes.
const MANIFEST_VERSION: u32 = 1;

/// History filename within the cache directory.
pub const MANIFEST_FILE: &str = "download-history.json";

/// One cached archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEntry {
    /// Upstream release id (tag, or branch for snapshot archives).
    pub id: String,
    /// Where the archive came from.
    pub url: String,
    /// SHA-256 of the archive bytes.
    pub sha256: String,
    /// Extracted directory, relative to the cache directory.
    pub path: PathBuf,
}

/// Top-level download history.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchManifest {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Entries keyed by product name.
    pub entries: BTreeMap<String, FetchEntry>,
}

impl Default for FetchManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchManifest {
    /// Create an empty history.
    pub fn new() -> Self {
        Self { version: MANIFEST_VERSION, entries: BTreeMap::new() }
    }

    /// Load the history from `<cache_dir>/download-history.json`.
    ///
    /// Returns `None` if the file is missing, corrupt, or has a version mismatch.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let data = fs::read_to_string(cache_dir.join(MANIFEST_FILE)).ok()?;
        let manifest: Self = serde_json::from_str(&data).ok()?;
        if manifest.version != MANIFEST_VERSION {
            return None;
        }
        Some(manifest)
    }

    /// Load the history, or start an empty one.
    pub fn load_or_new(cache_dir: &Path) -> Self {
        Self::load(cache_dir).unwrap_or_default()
    }

    /// Save the history atomically (write to tmp, then rename).
    pub fn save(&self, cache_dir: &Path) -> Result<()> {
        fs::create_dir_all(cache_dir).with_context(|| format!("creating {}", cache_dir.display()))?;

        let path = cache_dir.join(MANIFEST_FILE);
        let tmp_path = cache_dir.join(format!("{MANIFEST_FILE}.tmp"));

        let json = serde_json::to_string_pretty(self).context("failed to serialize download history")?;
        fs::write(&tmp_path, json).context("failed to write temporary download history")?;
        fs::rename(&tmp_path, &path).context("failed to atomically replace download history")?;
        Ok(())
    }

    /// The recorded entry for `product`.
    pub fn get(&self, product: &str) -> Option<&FetchEntry> {
        self.entries.get(product)
    }

    /// Returns `true` if `product` was fetched at `id` and is still on disk.
    pub fn is_current(&self, cache_dir: &Path, product: &str, id: &str) -> bool {
        self.entries.get(product).is_some_and(|e| e.id == id && cache_dir.join(&e.path).is_dir())
    }

    /// Returns the extracted directory of `product` if it exists, whatever
    /// its id.
    pub fn cached_dir(&self, cache_dir: &Path, product: &str) -> Option<PathBuf> {
        self.entries.get(product).map(|e| cache_dir.join(&e.path)).filter(|p| p.is_dir())
    }

    /// Record a fetched archive, replacing any previous entry.
    pub fn record(&mut self, product: &str, entry: FetchEntry) {
        self.entries.insert(product.to_string(), entry);
    }
}

/// Hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, path: &str) -> FetchEntry {
        FetchEntry { id: id.into(), url: "https://example.invalid/a.zip".into(), sha256: sha256_hex(b"a"), path: path.into() }
    }

    #[test]
    fn history_survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = FetchManifest::new();
        manifest.record("Lilu", entry("1.6.8", "kexts/Lilu"));
        manifest.save(dir.path()).unwrap();

        let loaded = FetchManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.get("Lilu"), Some(&entry("1.6.8", "kexts/Lilu")));
        assert!(!dir.path().join(format!("{MANIFEST_FILE}.tmp")).exists());
    }

    #[test]
    fn other_versions_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), r#"{"version": 99, "entries": {}}"#).unwrap();
        assert!(FetchManifest::load(dir.path()).is_none());
        assert!(FetchManifest::load_or_new(dir.path()).entries.is_empty());
    }

    #[test]
    fn current_needs_matching_id_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = FetchManifest::new();
        manifest.record("Lilu", entry("1.6.8", "kexts/Lilu"));
        assert!(!manifest.is_current(dir.path(), "Lilu", "1.6.8"), "directory is missing");

        std::fs::create_dir_all(dir.path().join("kexts/Lilu")).unwrap();
        assert!(manifest.is_current(dir.path(), "Lilu", "1.6.8"));
        assert!(!manifest.is_current(dir.path(), "Lilu", "1.6.9"));
        assert_eq!(manifest.cached_dir(dir.path(), "Lilu"), Some(dir.path().join("kexts/Lilu")));
    }

    #[test]
    fn sha256_is_lowercase_hex() {
        assert_eq!(sha256_hex(b"abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
