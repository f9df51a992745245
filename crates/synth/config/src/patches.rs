//! `Kernel.Patch` entries: the fetched AMD set plus the fixed Intel ones.

use plist::{Dictionary, Value};

use crate::ConfigError;
use crate::dict::{int, string};

/// Upstream location of the AMD kernel patches.
pub const AMD_PATCHES_URL: &str = "https://raw.githubusercontent.com/AMD-OSX/AMD_Vanilla/master/patches.plist";

/// Comment marker of the patches whose `Replace` encodes the core count.
const CORE_COUNT_MARKER: &str = "cpuid_cores_per_package";

/// A list of `Kernel.Patch` dictionaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelPatchSet {
    patches: Vec<Dictionary>,
}

impl KernelPatchSet {
    /// Parses a plist holding either `Kernel.Patch` or a bare array.
    ///
    /// # Errors
    ///
    /// Fails if the plist is malformed or holds no patch array.
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let value = Value::from_reader(std::io::Cursor::new(bytes)).map_err(|e| ConfigError::PatchSet(e.to_string()))?;
        let array = match &value {
            Value::Array(a) => Some(a),
            Value::Dictionary(d) => d
                .get("Kernel")
                .and_then(Value::as_dictionary)
                .and_then(|k| k.get("Patch"))
                .and_then(Value::as_array),
            _ => None,
        };
        let Some(array) = array else {
            return Err(ConfigError::PatchSet("no Kernel.Patch array".into()));
        };
        let patches = array
            .iter()
            .map(|p| p.as_dictionary().cloned())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ConfigError::PatchSet("patch entry is not a dictionary".into()))?;
        Ok(Self { patches })
    }

    /// Number of patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// The patches with every core-count `Replace` rewritten for
    /// `core_count` cores.
    #[must_use]
    pub fn for_cores(&self, core_count: u32) -> Vec<Value> {
        let cores = u8::try_from(core_count).unwrap_or(u8::MAX);
        self.patches
            .iter()
            .map(|patch| {
                let mut patch = patch.clone();
                let encodes_cores =
                    patch.get("Comment").and_then(Value::as_string).is_some_and(|c| c.contains(CORE_COUNT_MARKER));
                if encodes_cores {
                    if let Some(Value::Data(replace)) = patch.get_mut("Replace") {
                        rewrite_core_count(replace, cores);
                    }
                }
                Value::Dictionary(patch)
            })
            .collect()
    }
}

/// The immediate of the `mov` that loads the core count is the byte after
/// the opcode.
fn rewrite_core_count(replace: &mut [u8], cores: u8) {
    if let Some(slot) = replace.get_mut(1) {
        *slot = cores;
    }
}

fn base_patch(comment: &str, base: &str, find: &[u8], replace: &[u8], min_kernel: &str) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("Arch".into(), string("x86_64"));
    dict.insert("Base".into(), string(base));
    dict.insert("Comment".into(), string(comment));
    dict.insert("Count".into(), int(if find.is_empty() { 1 } else { 0 }));
    dict.insert("Enabled".into(), Value::Boolean(true));
    dict.insert("Find".into(), Value::Data(find.to_vec()));
    dict.insert("Identifier".into(), string("kernel"));
    dict.insert("Limit".into(), int(0));
    dict.insert("Mask".into(), Value::Data(Vec::new()));
    dict.insert("MaxKernel".into(), string(""));
    dict.insert("MinKernel".into(), string(min_kernel));
    dict.insert("Replace".into(), Value::Data(replace.to_vec()));
    dict.insert("ReplaceMask".into(), Value::Data(Vec::new()));
    dict.insert("Skip".into(), int(0));
    Value::Dictionary(dict)
}

/// Returns early from the per-core and per-package XCPM MSR setup so cores
/// keep a synchronised TSC.
pub(crate) fn tsc_sync_patches() -> Vec<Value> {
    vec![
        base_patch("TSC sync: skip _xcpm_core_scope_msrs", "_xcpm_core_scope_msrs", &[], &[0xC3], "17.0.0"),
        base_patch("TSC sync: skip _xcpm_pkg_scope_msrs", "_xcpm_pkg_scope_msrs", &[], &[0xC3], "17.0.0"),
    ]
}

/// Reports `threads` logical processors per package from `_cpuid_set_info`,
/// re-enabling Hyper-Threading on hybrid parts with E-cores disabled.
pub(crate) fn force_ht_patch(threads: u32) -> Value {
    let threads = u8::try_from(threads).unwrap_or(u8::MAX);
    base_patch(
        "Force enable Hyper-Threading",
        "_cpuid_set_info",
        &[0xC7, 0x87, 0x0C, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
        &[0xC7, 0x87, 0x0C, 0x01, 0x00, 0x00, threads, 0x00, 0x00, 0x00],
        "21.0.0",
    )
}
