//! `.kext` bundles found on disk.

use std::path::Path;

use plist::Value;
use walkdir::WalkDir;

use crate::KextError;

/// Path of `Info.plist` inside a bundle.
pub const INFO_PLIST: &str = "Contents/Info.plist";

const PLUGINS: &str = "/Contents/PlugIns/";

/// A bundle and the `Info.plist` keys emission needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KextBundle {
    /// Bundle stem (`Lilu` for `Lilu.kext`).
    pub name: String,
    /// Path relative to the kexts directory, `/`-separated.
    pub bundle_path: String,
    /// `CFBundleIdentifier`.
    pub identifier: String,
    /// `CFBundleVersion`.
    pub version: Option<String>,
    /// `Contents/MacOS/<CFBundleExecutable>`, empty for codeless bundles.
    pub executable_path: String,
    /// `Info.plist` path relative to the bundle.
    pub plist_path: String,
    /// Keys of `OSBundleLibraries`.
    pub libraries: Vec<String>,
}

impl KextBundle {
    /// Bundle path of the enclosing kext for a plugin.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.bundle_path.rsplit_once(PLUGINS).map(|(parent, _)| parent)
    }

    /// Reads the bundle at `root/bundle_path`.
    ///
    /// # Errors
    ///
    /// Fails if `Info.plist` is unreadable or has no `CFBundleIdentifier`.
    pub fn read(root: &Path, bundle_path: &str) -> Result<Self, KextError> {
        let dir = root.join(bundle_path);
        let plist_file = dir.join(INFO_PLIST);
        let info = Value::from_file(&plist_file).map_err(|source| KextError::Plist { path: plist_file.clone(), source })?;
        let Some(dict) = info.as_dictionary() else {
            return Err(KextError::InvalidInfoPlist { path: plist_file, reason: "not a dictionary".into() });
        };
        let string = |key: &str| dict.get(key).and_then(Value::as_string).map(str::to_string);

        let Some(identifier) = string("CFBundleIdentifier") else {
            return Err(KextError::InvalidInfoPlist { path: plist_file, reason: "missing CFBundleIdentifier".into() });
        };
        let executable_path = string("CFBundleExecutable")
            .filter(|exe| !exe.is_empty())
            .map(|exe| format!("Contents/MacOS/{exe}"))
            .filter(|rel| dir.join(rel).metadata().is_ok_and(|m| m.is_file() && m.len() > 0))
            .unwrap_or_default();
        let libraries = dict
            .get("OSBundleLibraries")
            .and_then(Value::as_dictionary)
            .map(|libs| libs.keys().cloned().collect())
            .unwrap_or_default();
        let name = bundle_path
            .rsplit('/')
            .next()
            .and_then(|leaf| leaf.strip_suffix(".kext"))
            .unwrap_or(bundle_path)
            .to_string();

        Ok(Self {
            name,
            bundle_path: bundle_path.to_string(),
            identifier,
            version: string("CFBundleVersion"),
            executable_path,
            plist_path: INFO_PLIST.to_string(),
            libraries,
        })
    }
}

/// Finds every bundle under `kexts_dir`, plugins included, in path order.
///
/// Directories named `*.kext` without an `Info.plist` are skipped.
///
/// # Errors
///
/// Fails on walk errors and on malformed `Info.plist` files.
pub fn discover(kexts_dir: &Path) -> Result<Vec<KextBundle>, KextError> {
    let mut bundles = Vec::new();
    for entry in WalkDir::new(kexts_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let is_kext = entry.file_type().is_dir() && entry.path().extension().is_some_and(|ext| ext == "kext");
        if !is_kext {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(kexts_dir) else { continue };
        let rel = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        if !entry.path().join(INFO_PLIST).is_file() {
            log::warn!("{rel}: no {INFO_PLIST}, skipping");
            continue;
        }
        bundles.push(KextBundle::read(kexts_dir, &rel)?);
    }
    log::debug!("discovered {} bundle(s) in {}", bundles.len(), kexts_dir.display());
    Ok(bundles)
}

/// Writes a minimal bundle at `root/bundle_path`. Test support for this crate
/// and its dependents.
#[doc(hidden)]
pub fn write_test_bundle(
    root: &Path,
    bundle_path: &str,
    identifier: &str,
    executable: Option<&str>,
    libraries: &[&str],
) -> std::io::Result<()> {
    let dir = root.join(bundle_path);
    std::fs::create_dir_all(dir.join("Contents"))?;
    let mut dict = plist::Dictionary::new();
    dict.insert("CFBundleIdentifier".into(), Value::String(identifier.into()));
    dict.insert("CFBundleVersion".into(), Value::String("1.0.0".into()));
    if let Some(exe) = executable {
        dict.insert("CFBundleExecutable".into(), Value::String(exe.into()));
        std::fs::create_dir_all(dir.join("Contents/MacOS"))?;
        std::fs::write(dir.join("Contents/MacOS").join(exe), b"\xCF\xFA\xED\xFE")?;
    }
    let libs: plist::Dictionary = libraries.iter().map(|l| ((*l).to_string(), Value::String("1.0.0".into()))).collect();
    dict.insert("OSBundleLibraries".into(), Value::Dictionary(libs));
    Value::Dictionary(dict).to_file_xml(dir.join(INFO_PLIST)).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugins_are_found_with_their_parent() {
        let dir = tempfile::tempdir().unwrap();
        write_test_bundle(dir.path(), "VoodooPS2Controller.kext", "as.acidanthera.voodoo.driver.PS2Controller", Some("VoodooPS2Controller"), &[]).unwrap();
        write_test_bundle(
            dir.path(),
            "VoodooPS2Controller.kext/Contents/PlugIns/VoodooPS2Keyboard.kext",
            "as.acidanthera.voodoo.driver.PS2Keyboard",
            Some("VoodooPS2Keyboard"),
            &["as.acidanthera.voodoo.driver.PS2Controller"],
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("Broken.kext")).unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "VoodooPS2Controller");
        assert_eq!(found[0].parent(), None);
        assert_eq!(found[0].executable_path, "Contents/MacOS/VoodooPS2Controller");
        assert_eq!(found[1].name, "VoodooPS2Keyboard");
        assert_eq!(found[1].parent(), Some("VoodooPS2Controller.kext"));
        assert_eq!(found[1].libraries, ["as.acidanthera.voodoo.driver.PS2Controller"]);
    }

    #[test]
    fn codeless_bundles_have_no_executable() {
        let dir = tempfile::tempdir().unwrap();
        write_test_bundle(dir.path(), "USBMap.kext", "com.example.USBMap", None, &[]).unwrap();
        let bundle = KextBundle::read(dir.path(), "USBMap.kext").unwrap();
        assert_eq!(bundle.executable_path, "");
        assert_eq!(bundle.plist_path, "Contents/Info.plist");
    }

    #[test]
    fn a_plist_without_identifier_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Bad.kext/Contents")).unwrap();
        Value::Dictionary(plist::Dictionary::new()).to_file_xml(dir.path().join("Bad.kext").join(INFO_PLIST)).unwrap();
        assert!(matches!(discover(dir.path()), Err(KextError::InvalidInfoPlist { .. })));
    }
}
