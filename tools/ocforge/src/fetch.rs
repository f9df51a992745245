//! Downloading release archives into the cache.
//!
//! Archives are fetched with `curl` child processes and unpacked in place:
//! `.zip` through `zip`, `.tar.gz` through `flate2` + `tar`. When the network
//! fails and an older copy is cached, the stale copy is used and a warning
//! is printed.

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

use ocforge_config::patches::AMD_PATCHES_URL;
use ocforge_kext::{KextInfo, copy_tree};
use ocforge_kext::catalog::Download;

use crate::cache::{FetchEntry, FetchManifest, sha256_hex};
use crate::verbose::{dprintln, vprintln};

/// Subdirectory of the cache holding kext releases.
pub const KEXTS_DIR: &str = "kexts";
/// Subdirectory of the cache holding the assembled OpenCore tree.
pub const BASE_DIR: &str = "base";

const OPENCORE_PKG: &str = "OpenCorePkg";
const BINARY_DATA: &str = "OcBinaryData";
const BINARY_DATA_URL: &str = "https://github.com/acidanthera/OcBinaryData/archive/refs/heads/master.zip";
const AMD_VANILLA: &str = "AMD_Vanilla";

// ---------------------------------------------------------------------------
// Upstream lookup
// ---------------------------------------------------------------------------

/// A downloadable archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Release id recorded in the history.
    pub id: String,
    /// Archive filename.
    pub asset: String,
    /// Download URL.
    pub url: String,
}

/// Where a product comes from.
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    /// Latest GitHub release.
    GitHub { owner: &'a str, repo: &'a str },
    /// A fixed URL whose content is tracked under a fixed id.
    Snapshot { url: &'a str, id: &'a str },
}

impl Upstream<'_> {
    fn resolve(self) -> Result<Release> {
        match self {
            Self::GitHub { owner, repo } => {
                let url = format!("https://api.github.com/repos/{owner}/{repo}/releases/latest");
                let body = curl(&url)?;
                let json: Value =
                    serde_json::from_slice(&body).with_context(|| format!("parsing release list of {owner}/{repo}"))?;
                parse_release(&json).with_context(|| format!("{owner}/{repo}"))
            }
            Self::Snapshot { url, id } => {
                let asset = url.rsplit('/').next().unwrap_or(url).to_string();
                Ok(Release { id: id.to_string(), asset, url: url.to_string() })
            }
        }
    }
}

/// Picks the archive to download from a GitHub release: the `RELEASE` zip
/// when there is one, else the first zip, else the first tarball.
pub fn parse_release(json: &Value) -> Result<Release> {
    let id = json
        .get("tag_name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("release has no 'tag_name'"))?;
    let assets: Vec<(&str, &str)> = json
        .get("assets")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("release has no 'assets' array"))?
        .iter()
        .filter_map(|a| Some((a.get("name")?.as_str()?, a.get("browser_download_url")?.as_str()?)))
        .collect();

    let pick = assets
        .iter()
        .find(|(name, _)| name.ends_with(".zip") && name.to_ascii_uppercase().contains("RELEASE"))
        .or_else(|| assets.iter().find(|(name, _)| name.ends_with(".zip") && !name.to_ascii_uppercase().contains("DEBUG")))
        .or_else(|| assets.iter().find(|(name, _)| ArchiveKind::from_name(name).is_some()))
        .ok_or_else(|| anyhow!("release {id} has no zip or tar.gz asset"))?;
    Ok(Release { id: id.to_string(), asset: pick.0.to_string(), url: pick.1.to_string() })
}

/// Runs `curl -sSfL` and returns the body.
fn curl(url: &str) -> Result<Vec<u8>> {
    vprintln!("  GET {url}");
    let output = Command::new("curl")
        .args(["-sSfL", "-H", "User-Agent: ocforge", url])
        .output()
        .context("failed to run curl")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("failed to download {url}: {}", stderr.trim());
    }
    Ok(output.stdout)
}

// ---------------------------------------------------------------------------
// Archives
// ---------------------------------------------------------------------------

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Format from a filename.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Unpacks `bytes` into `dest`.
pub fn extract(bytes: &[u8], kind: ArchiveKind, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    match kind {
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("reading zip archive")?;
            archive.extract(dest).with_context(|| format!("extracting into {}", dest.display()))?;
        }
        ArchiveKind::TarGz => {
            let decoder = flate2::read::GzDecoder::new(bytes);
            tar::Archive::new(decoder)
                .unpack(dest)
                .with_context(|| format!("extracting into {}", dest.display()))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Downloads products into the cache and keeps the history current.
pub struct Fetcher {
    cache_dir: PathBuf,
    manifest: FetchManifest,
    force: bool,
    offline: bool,
}

/// What [`fetch_kexts`] did.
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Products now in the cache.
    pub fetched: Vec<String>,
    /// Products that could not be fetched, with the reason.
    pub failed: Vec<(String, String)>,
}

impl Fetcher {
    /// Opens the cache at `cache_dir`.
    pub fn new(cache_dir: &Path, force: bool, offline: bool) -> Self {
        Self { cache_dir: cache_dir.to_path_buf(), manifest: FetchManifest::load_or_new(cache_dir), force, offline }
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn stale_or(&self, product: &str, err: anyhow::Error) -> Result<PathBuf> {
        match self.manifest.cached_dir(&self.cache_dir, product) {
            Some(dir) => {
                log::warn!("{product}: {err:#}; using the cached copy");
                Ok(dir)
            }
            None => Err(err.context(format!("{product} is not cached"))),
        }
    }

    /// Makes sure the latest archive of `product` is extracted under
    /// `<cache>/<subdir>/<product>` and returns that directory.
    pub fn fetch(&mut self, product: &str, upstream: Upstream<'_>, subdir: &str) -> Result<PathBuf> {
        if self.offline {
            return self.stale_or(product, anyhow!("offline"));
        }
        let release = match upstream.resolve() {
            Ok(r) => r,
            Err(e) => return self.stale_or(product, e),
        };
        if !self.force && self.manifest.is_current(&self.cache_dir, product, &release.id) {
            vprintln!("  {product} {} is cached", release.id);
            return Ok(self.cache_dir.join(subdir).join(product));
        }

        dprintln!("  Downloading {product} {}...", release.id);
        let bytes = match curl(&release.url) {
            Ok(b) => b,
            Err(e) => return self.stale_or(product, e),
        };
        let kind = ArchiveKind::from_name(&release.asset)
            .ok_or_else(|| anyhow!("{product}: unsupported archive {}", release.asset))?;

        let rel = Path::new(subdir).join(product);
        let dest = self.cache_dir.join(&rel);
        if dest.exists() {
            fs::remove_dir_all(&dest).with_context(|| format!("removing {}", dest.display()))?;
        }
        extract(&bytes, kind, &dest).with_context(|| format!("unpacking {}", release.asset))?;

        self.manifest.record(
            product,
            FetchEntry { id: release.id, url: release.url, sha256: sha256_hex(&bytes), path: rel },
        );
        self.manifest.save(&self.cache_dir)?;
        Ok(dest)
    }

    /// Downloads a single file to `<cache>/<product>/<file_name>`.
    pub fn fetch_file(&mut self, product: &str, url: &str, id: &str, file_name: &str) -> Result<PathBuf> {
        let dir = self.cache_dir.join(product);
        let file = dir.join(file_name);
        if self.offline || (!self.force && self.manifest.is_current(&self.cache_dir, product, id) && file.is_file()) {
            return if file.is_file() { Ok(file) } else { Err(anyhow!("{product} is not cached")) };
        }
        dprintln!("  Downloading {product}...");
        let bytes = match curl(url) {
            Ok(b) => b,
            Err(e) => return self.stale_or(product, e).map(|d| d.join(file_name)),
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        fs::write(&file, &bytes).with_context(|| format!("writing {}", file.display()))?;
        self.manifest.record(
            product,
            FetchEntry { id: id.to_string(), url: url.to_string(), sha256: sha256_hex(&bytes), path: PathBuf::from(product) },
        );
        self.manifest.save(&self.cache_dir)?;
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Where `macserial` lands inside the OpenCore package.
pub fn macserial_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(OPENCORE_PKG).join("Utilities").join("macserial")
}

/// Fetches OpenCore and its binary data, then assembles the base EFI tree
/// under `<cache>/base`. Returns the directory holding `EFI`.
pub fn fetch_opencore(fetcher: &mut Fetcher) -> Result<PathBuf> {
    let pkg = fetcher.fetch(OPENCORE_PKG, Upstream::GitHub { owner: "acidanthera", repo: OPENCORE_PKG }, "")?;
    let data = fetcher.fetch(BINARY_DATA, Upstream::Snapshot { url: BINARY_DATA_URL, id: "master" }, "")?;
    prepare_base(&pkg, &data, &fetcher.cache_dir().join(BASE_DIR))
}

/// Lays out `base/EFI` from the OpenCore package (`X64/EFI`, the sample
/// config) and the binary data (`Drivers`, `Resources`).
pub fn prepare_base(pkg: &Path, data: &Path, base: &Path) -> Result<PathBuf> {
    if base.exists() {
        fs::remove_dir_all(base).with_context(|| format!("removing {}", base.display()))?;
    }
    let efi = base.join("EFI");
    let src = pkg.join("X64").join("EFI");
    if !src.is_dir() {
        bail!("{} has no X64/EFI directory", pkg.display());
    }
    copy_tree(&src, &efi)?;

    // Snapshot archives wrap everything in `<repo>-<branch>/`.
    let data_root = fs::read_dir(data)
        .with_context(|| format!("reading {}", data.display()))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| p.join("Resources").is_dir())
        .unwrap_or_else(|| data.to_path_buf());

    let oc = efi.join("OC");
    let drivers = data_root.join("Drivers");
    if drivers.is_dir() {
        copy_tree(&drivers, &oc.join("Drivers"))?;
    }
    let resources = data_root.join("Resources");
    if resources.is_dir() {
        copy_tree(&resources, &oc.join("Resources"))?;
    }

    let sample = pkg.join("Docs").join("Sample.plist");
    fs::copy(&sample, oc.join("config.plist")).with_context(|| format!("copying {}", sample.display()))?;
    Ok(base.to_path_buf())
}

/// Fetches the release of every kext in `kexts` that has one. Failures are
/// collected, not fatal: the build reports the bundles it cannot find.
pub fn fetch_kexts<'a>(fetcher: &mut Fetcher, kexts: impl IntoIterator<Item = &'a KextInfo>) -> FetchSummary {
    let repos: BTreeSet<(&str, &str)> = kexts
        .into_iter()
        .filter_map(|k| match k.download {
            Download::GitHub { owner, repo } => Some((owner, repo)),
            Download::Extra(_) => None,
        })
        .collect();

    let mut summary = FetchSummary::default();
    for (owner, repo) in repos {
        match fetcher.fetch(repo, Upstream::GitHub { owner, repo }, KEXTS_DIR) {
            Ok(_) => summary.fetched.push(repo.to_string()),
            Err(e) => {
                log::warn!("{repo}: {e:#}");
                summary.failed.push((repo.to_string(), format!("{e:#}")));
            }
        }
    }
    summary
}

/// Copies kexts without an upstream release from `extras_dir` into the
/// kext cache. Returns the names that were found.
pub fn copy_extras<'a>(
    extras_dir: &Path,
    cache_dir: &Path,
    kexts: impl IntoIterator<Item = &'a KextInfo>,
) -> Result<Vec<String>> {
    let dest = cache_dir.join(KEXTS_DIR).join("extras");
    let mut copied = Vec::new();
    for name in kexts.into_iter().filter_map(|k| match k.download {
        Download::Extra(dir) => Some(dir),
        Download::GitHub { .. } => None,
    }) {
        let src = extras_dir.join(name);
        if !src.exists() {
            log::warn!("{name}: not found under {}", extras_dir.display());
            continue;
        }
        copy_tree(&src, &dest.join(name))?;
        copied.push(name.to_string());
    }
    Ok(copied)
}

/// Fetches the AMD kernel patch set.
pub fn fetch_amd_patches(fetcher: &mut Fetcher) -> Result<PathBuf> {
    fetcher.fetch_file(AMD_VANILLA, AMD_PATCHES_URL, "master", "patches.plist")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn release_prefers_the_release_zip() {
        let json: Value = serde_json::from_str(
            r#"{"tag_name": "1.6.8", "assets": [
                {"name": "Lilu-1.6.8-DEBUG.zip", "browser_download_url": "https://example.invalid/d.zip"},
                {"name": "Lilu-1.6.8-RELEASE.zip", "browser_download_url": "https://example.invalid/r.zip"}
            ]}"#,
        )
        .unwrap();
        let release = parse_release(&json).unwrap();
        assert_eq!(release.id, "1.6.8");
        assert_eq!(release.asset, "Lilu-1.6.8-RELEASE.zip");
        assert_eq!(release.url, "https://example.invalid/r.zip");
    }

    #[test]
    fn release_without_archives_is_an_error() {
        let json: Value = serde_json::from_str(r#"{"tag_name": "v1", "assets": [{"name": "notes.txt", "browser_download_url": "x"}]}"#).unwrap();
        assert!(parse_release(&json).is_err());
    }

    #[test]
    fn archive_kind_from_name() {
        assert_eq!(ArchiveKind::from_name("OpenCore-1.0.0-RELEASE.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("iasl.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("patches.plist"), None);
    }

    #[test]
    fn extracts_zip_and_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let zip = zip_bytes(&[("Lilu.kext/Contents/Info.plist", b"<plist/>")]);
        extract(&zip, ArchiveKind::Zip, &dir.path().join("z")).unwrap();
        assert!(dir.path().join("z/Lilu.kext/Contents/Info.plist").is_file());

        let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default()));
        let data = b"binary";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "bin/iasl", &data[..]).unwrap();
        let tgz = builder.into_inner().unwrap().finish().unwrap();
        extract(&tgz, ArchiveKind::TarGz, &dir.path().join("t")).unwrap();
        assert_eq!(std::fs::read(dir.path().join("t/bin/iasl")).unwrap(), data);
    }

    #[test]
    fn base_tree_merges_package_and_binary_data() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("OpenCorePkg");
        let data = dir.path().join("OcBinaryData");
        extract(
            &zip_bytes(&[
                ("X64/EFI/BOOT/BOOTx64.efi", b"boot"),
                ("X64/EFI/OC/OpenCore.efi", b"oc"),
                ("X64/EFI/OC/Drivers/OpenRuntime.efi", b"rt"),
                ("Docs/Sample.plist", b"<plist/>"),
            ]),
            ArchiveKind::Zip,
            &pkg,
        )
        .unwrap();
        extract(
            &zip_bytes(&[
                ("OcBinaryData-master/Drivers/HfsPlus.efi", b"hfs"),
                ("OcBinaryData-master/Resources/Image/Acidanthera/GoldenGate/Background.icns", b"img"),
            ]),
            ArchiveKind::Zip,
            &data,
        )
        .unwrap();

        let base = prepare_base(&pkg, &data, &dir.path().join("base")).unwrap();
        let oc = base.join("EFI/OC");
        assert!(base.join("EFI/BOOT/BOOTx64.efi").is_file());
        assert!(oc.join("Drivers/OpenRuntime.efi").is_file());
        assert!(oc.join("Drivers/HfsPlus.efi").is_file());
        assert!(oc.join("Resources/Image/Acidanthera/GoldenGate/Background.icns").is_file());
        assert!(oc.join("config.plist").is_file());
    }

    #[test]
    fn offline_uses_the_cache_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = FetchManifest::new();
        manifest.record(
            "Lilu",
            FetchEntry { id: "1.6.7".into(), url: String::new(), sha256: String::new(), path: "kexts/Lilu".into() },
        );
        manifest.save(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("kexts/Lilu")).unwrap();

        let mut fetcher = Fetcher::new(dir.path(), false, true);
        let lilu = Upstream::GitHub { owner: "acidanthera", repo: "Lilu" };
        assert_eq!(fetcher.fetch("Lilu", lilu, KEXTS_DIR).unwrap(), dir.path().join("kexts/Lilu"));
        let weg = Upstream::GitHub { owner: "acidanthera", repo: "WhateverGreen" };
        assert!(fetcher.fetch("WhateverGreen", weg, KEXTS_DIR).is_err());
    }

    #[test]
    fn extras_are_copied_by_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let extras = dir.path().join("extras");
        std::fs::create_dir_all(extras.join("NullEthernet/NullEthernet.kext/Contents")).unwrap();
        std::fs::write(extras.join("NullEthernet/NullEthernet.kext/Contents/Info.plist"), b"<plist/>").unwrap();

        let wanted = [ocforge_kext::catalog::find("NullEthernet").unwrap(), ocforge_kext::catalog::find("Lilu").unwrap()];
        let copied = copy_extras(&extras, dir.path(), wanted).unwrap();
        assert_eq!(copied, ["NullEthernet"]);
        assert!(dir.path().join("kexts/extras/NullEthernet/NullEthernet.kext/Contents/Info.plist").is_file());
    }
}
