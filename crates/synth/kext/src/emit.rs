//! `Kernel.Add` and `Kernel.Block` emission.
//!
//! Bundles are ordered depth first over their `OSBundleLibraries` (and the
//! implicit plugin-to-parent edge), so every kext follows what it links
//! against. A kext's window is its own catalog window narrowed by the windows
//! of everything it depends on.

use std::collections::HashMap;

use plist::{Dictionary, Value};

use ocforge_core::DarwinVersion;

use crate::bundle::KextBundle;
use crate::catalog::KextId;
use crate::resolve::KextSelection;

/// One `Kernel.Add` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelAddEntry {
    /// `Any`, `i386` or `x86_64`.
    pub arch: String,
    /// Relative to `EFI/OC/Kexts`.
    pub bundle_path: String,
    /// Free text.
    pub comment: String,
    /// Loaded at boot.
    pub enabled: bool,
    /// Relative to the bundle; empty for codeless kexts.
    pub executable_path: String,
    /// Upper bound; empty for none.
    pub max_kernel: String,
    /// Lower bound; empty for none.
    pub min_kernel: String,
    /// Relative to the bundle.
    pub plist_path: String,
}

impl KernelAddEntry {
    /// The entry as a plist dictionary.
    #[must_use]
    pub fn to_plist(&self) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("Arch".into(), Value::String(self.arch.clone()));
        dict.insert("BundlePath".into(), Value::String(self.bundle_path.clone()));
        dict.insert("Comment".into(), Value::String(self.comment.clone()));
        dict.insert("Enabled".into(), Value::Boolean(self.enabled));
        dict.insert("ExecutablePath".into(), Value::String(self.executable_path.clone()));
        dict.insert("MaxKernel".into(), Value::String(self.max_kernel.clone()));
        dict.insert("MinKernel".into(), Value::String(self.min_kernel.clone()));
        dict.insert("PlistPath".into(), Value::String(self.plist_path.clone()));
        Value::Dictionary(dict)
    }
}

/// One `Kernel.Block` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Architecture.
    pub arch: String,
    /// Free text.
    pub comment: String,
    /// Applied at boot.
    pub enabled: bool,
    /// Bundle identifier of the system kext.
    pub identifier: String,
    /// Upper bound; empty for none.
    pub max_kernel: String,
    /// Lower bound; empty for none.
    pub min_kernel: String,
    /// `Disable` or `Exclude`.
    pub strategy: String,
}

impl BlockEntry {
    /// The entry as a plist dictionary.
    #[must_use]
    pub fn to_plist(&self) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("Arch".into(), Value::String(self.arch.clone()));
        dict.insert("Comment".into(), Value::String(self.comment.clone()));
        dict.insert("Enabled".into(), Value::Boolean(self.enabled));
        dict.insert("Identifier".into(), Value::String(self.identifier.clone()));
        dict.insert("MaxKernel".into(), Value::String(self.max_kernel.clone()));
        dict.insert("MinKernel".into(), Value::String(self.min_kernel.clone()));
        dict.insert("Strategy".into(), Value::String(self.strategy.clone()));
        Value::Dictionary(dict)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    min: Option<DarwinVersion>,
    max: Option<DarwinVersion>,
}

impl Window {
    const OPEN: Self = Self { min: None, max: None };

    fn narrow(self, other: Self) -> Self {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self { min, max }
    }

    fn contains(self, target: DarwinVersion) -> bool {
        target.within(self.min, self.max)
    }
}

fn own_window(bundle: &KextBundle, selection: &KextSelection) -> Window {
    let Some(id) = KextId::of(&bundle.name) else { return Window::OPEN };
    let info = id.info();
    let target = selection.target();
    if info.name == "AirportItlwm" {
        // Each build of the driver targets exactly one release.
        return Window {
            min: Some(DarwinVersion::major_floor(target.major)),
            max: Some(DarwinVersion::major_ceiling(target.major)),
        };
    }
    if selection.allow_unsupported() {
        // The legacy injector never loads past Catalina, forced or not.
        let max = (info.name == "AirPortBrcm4360_Injector").then(|| DarwinVersion::new(19, 99, 99));
        return Window { min: None, max };
    }
    Window { min: Some(info.min_version()), max: info.max_version() }
}

struct Graph<'a> {
    bundles: &'a [KextBundle],
    deps: Vec<Vec<usize>>,
    own: Vec<Window>,
    window: Vec<Window>,
    state: Vec<u8>,
    order: Vec<usize>,
}

impl Graph<'_> {
    fn visit(&mut self, i: usize) {
        match self.state[i] {
            2 => return,
            1 => {
                log::warn!("{}: dependency cycle", self.bundles[i].bundle_path);
                return;
            }
            _ => {}
        }
        self.state[i] = 1;
        let mut window = self.own[i];
        for dep in self.deps[i].clone() {
            self.visit(dep);
            if self.state[dep] == 2 {
                window = window.narrow(self.window[dep]);
            }
        }
        self.window[i] = window;
        self.state[i] = 2;
        self.order.push(i);
    }
}

fn sort_key(bundle: &KextBundle) -> (bool, Option<KextId>, &str) {
    let id = KextId::of(&bundle.name);
    (id.is_none(), id, bundle.bundle_path.as_str())
}

fn bound(version: Option<DarwinVersion>, elide: impl Fn(DarwinVersion) -> bool) -> String {
    version.filter(|&v| !elide(v)).map(|v| v.to_string()).unwrap_or_default()
}

/// Builds the ordered `Kernel.Add` list for `bundles`.
///
/// Bundles whose window excludes the selection's target are left out, along
/// with everything that depends on them. Bounds at or beyond `latest` and
/// `lowest` are written as empty strings.
#[must_use]
pub fn emit(
    bundles: &[KextBundle],
    selection: &KextSelection,
    latest: DarwinVersion,
    lowest: DarwinVersion,
) -> Vec<KernelAddEntry> {
    let mut by_identifier: HashMap<&str, usize> = HashMap::new();
    let mut by_path: HashMap<&str, usize> = HashMap::new();
    for (i, bundle) in bundles.iter().enumerate() {
        by_identifier.entry(bundle.identifier.as_str()).or_insert(i);
        by_path.insert(bundle.bundle_path.as_str(), i);
    }

    let mut roots: Vec<usize> = (0..bundles.len()).collect();
    roots.sort_by(|&a, &b| sort_key(&bundles[a]).cmp(&sort_key(&bundles[b])));
    let rank: HashMap<usize, usize> = roots.iter().enumerate().map(|(r, &i)| (i, r)).collect();

    let deps = bundles
        .iter()
        .enumerate()
        .map(|(i, bundle)| {
            let mut deps: Vec<usize> = bundle
                .libraries
                .iter()
                .filter_map(|lib| by_identifier.get(lib.as_str()).copied())
                .chain(bundle.parent().and_then(|p| by_path.get(p).copied()))
                .filter(|&d| d != i)
                .collect();
            deps.sort_by_key(|d| rank[d]);
            deps.dedup();
            deps
        })
        .collect();

    let mut graph = Graph {
        bundles,
        deps,
        own: bundles.iter().map(|b| own_window(b, selection)).collect(),
        window: vec![Window::OPEN; bundles.len()],
        state: vec![0; bundles.len()],
        order: Vec::with_capacity(bundles.len()),
    };
    for &i in &roots {
        graph.visit(i);
    }

    let target = selection.target();
    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::new();
    for &i in &graph.order {
        let bundle = &bundles[i];
        let window = graph.window[i];
        if !window.contains(target) {
            log::warn!(
                "{}: window {}..{} excludes {target}, leaving it out",
                bundle.bundle_path,
                bound(window.min, |_| false),
                bound(window.max, |_| false)
            );
            continue;
        }
        let enabled = seen.insert(bundle.identifier.as_str());
        if !enabled {
            log::info!("{}: duplicate of {}, disabled", bundle.bundle_path, bundle.identifier);
        }
        entries.push(KernelAddEntry {
            arch: "Any".into(),
            bundle_path: bundle.bundle_path.clone(),
            comment: bundle.name.clone(),
            enabled,
            executable_path: bundle.executable_path.clone(),
            max_kernel: bound(window.max, |v| v >= latest),
            min_kernel: bound(window.min, |v| v <= lowest),
            plist_path: bundle.plist_path.clone(),
        });
    }
    entries
}

fn section<'a>(parent: &'a mut Dictionary, key: &str) -> &'a mut Dictionary {
    if !matches!(parent.get(key), Some(Value::Dictionary(_))) {
        parent.insert(key.to_string(), Value::Dictionary(Dictionary::new()));
    }
    match parent.get_mut(key) {
        Some(Value::Dictionary(dict)) => dict,
        _ => unreachable!("section inserted above"),
    }
}

/// Replaces `Kernel.Add` and `Kernel.Block` in `config`.
pub fn apply_kernel_entries(config: &mut Dictionary, add: &[KernelAddEntry], block: &[BlockEntry]) {
    let kernel = section(config, "Kernel");
    kernel.insert("Add".into(), Value::Array(add.iter().map(KernelAddEntry::to_plist).collect()));
    kernel.insert("Block".into(), Value::Array(block.iter().map(BlockEntry::to_plist).collect()));
}
