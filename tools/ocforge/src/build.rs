//! Build orchestrator.
//!
//! [`BuildPlan`] settles the target release and the devices to hide.
//! [`spawn`] runs the build on a worker thread that reports [`BuildEvent`]s
//! over a channel; any error ends the run with a single
//! `Finished { ok: false }` and leaves the partial output on disk.
//!
//! Pipeline: recreate `EFI` → copy the OpenCore base → read the template →
//! ACPI patches → kexts → config sections → prune assets → write the plist.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;

use ocforge_acpi::AcpiTables;
use ocforge_acpigen::{GenContext, apply_acpi_patches, apply_overrides, default_selection};
use ocforge_config::{ConfigInput, KernelPatchSet, assemble, models, read_config, smbios, write_config};
use ocforge_core::{DarwinVersion, ExternalTools, ProcessTools, os};
use ocforge_hardware::compat::{self, DeviceCompat};
use ocforge_hardware::{CompatibilityReport, HardwareReport};
use ocforge_kext::{SelectOptions, SelectionOutcome, apply_kernel_entries, discover, emit, install, select};

use crate::prune;
use crate::settings::Settings;

/// Name of the saved SMBIOS identity inside the output directory.
pub const SMBIOS_FILE: &str = "smbios.json";

// ===========================================================================
// Plan
// ===========================================================================

/// Target release and device verdicts for one build.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Target macOS.
    pub target: DarwinVersion,
    /// Compatibility matrix the plan was derived from.
    pub compat: CompatibilityReport,
    /// Some kept device only works at the target with the legacy patcher.
    pub needs_legacy_patcher: bool,
    /// Devices hidden from macOS.
    pub disabled: Vec<DeviceCompat>,
}

impl BuildPlan {
    /// Resolves the target (`macos`, then the settings, then the newest
    /// supported release) and the devices to disable.
    pub fn new(report: &HardwareReport, settings: &Settings, macos: Option<&str>) -> Result<Self> {
        let native = compat::check(report, false);
        let target = match macos.or(settings.macos_version.as_deref()) {
            Some(selector) => os::resolve(selector).ok_or_else(|| anyhow!("unknown macOS release `{selector}`"))?,
            None => {
                let major = compat::default_target(&native, settings.include_beta)
                    .or_else(|| compat::default_target(&compat::check(report, true), settings.include_beta))
                    .ok_or_else(|| anyhow!("no macOS release supports this CPU and GPU combination"))?;
                DarwinVersion::major_floor(major)
            }
        };

        let needs_legacy_patcher = compat::needs_legacy_patcher(report, target.major, &settings.disabled_devices);
        let compat = if needs_legacy_patcher { compat::check(report, true) } else { native };
        if !compat.supports(target.major) {
            log::warn!("Darwin {} is outside the range this machine supports", target.major);
        }
        let disabled = compat.disabled_devices(target.major, needs_legacy_patcher, &settings.disabled_devices);
        for device in &disabled {
            log::info!("disabling {} ({})", device.name, device.category);
        }
        Ok(Self { target, compat, needs_legacy_patcher, disabled })
    }

    /// Runs the kext rules for this plan.
    pub fn select_kexts(&self, report: &HardwareReport, settings: &Settings) -> SelectionOutcome {
        select(
            report,
            &SelectOptions {
                target: self.target,
                allow_unsupported: settings.allow_unsupported_kexts,
                needs_legacy_patcher: self.needs_legacy_patcher,
                tsc_sync: settings.tsc_sync,
                custom_cpu_name: settings.custom_cpu_name.is_some(),
                disabled: &self.disabled,
            },
        )
    }

    /// Display name of the target.
    pub fn target_name(&self) -> String {
        os::os_name(self.target).map_or_else(|| format!("Darwin {}", self.target), |n| format!("macOS {n} ({})", self.target))
    }
}

// ===========================================================================
// Request and events
// ===========================================================================

/// Everything the worker needs; owned so it can move to the thread.
pub struct BuildRequest {
    pub report: HardwareReport,
    pub plan: BuildPlan,
    pub settings: Settings,
    /// Dumped ACPI tables; ACPI patches that need them are skipped without.
    pub acpi_dir: Option<PathBuf>,
    /// Directory holding the OpenCore base `EFI`.
    pub base_dir: PathBuf,
    /// Kext release cache.
    pub kexts_dir: PathBuf,
    /// AMD kernel patch set, when fetched.
    pub amd_patches: Option<PathBuf>,
    /// Output directory; the result is `<output>/EFI`.
    pub output_dir: PathBuf,
    /// Where to look for `iasl` and `macserial` first.
    pub tools_dir: Option<PathBuf>,
}

/// What the build produced.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub smbios_model: String,
    pub acpi_tables: usize,
    pub acpi_failed: Vec<String>,
    pub kexts: Vec<String>,
    pub missing_kexts: Vec<String>,
    pub pruned: usize,
    pub config: PathBuf,
}

/// Messages from the worker.
#[derive(Debug)]
pub enum BuildEvent {
    /// A step started.
    Progress { step: usize, total: usize, label: &'static str },
    /// A line for the console.
    Log(String),
    /// The build ended.
    Finished { ok: bool, output: PathBuf, summary: Option<BuildSummary>, error: Option<String> },
}

const STEPS: [&str; 8] = [
    "Preparing output directory",
    "Copying OpenCore",
    "Reading config template",
    "Generating ACPI patches",
    "Installing kexts",
    "Filling config sections",
    "Pruning unused assets",
    "Writing config.plist",
];

struct Reporter<'a> {
    tx: &'a Sender<BuildEvent>,
    step: usize,
}

impl Reporter<'_> {
    fn step(&mut self) {
        let label = STEPS[self.step];
        self.step += 1;
        // The receiver going away only means nobody is watching.
        let _ = self.tx.send(BuildEvent::Progress { step: self.step, total: STEPS.len(), label });
    }

    fn log(&self, line: String) {
        let _ = self.tx.send(BuildEvent::Log(line));
    }
}

/// Starts the build on a worker thread.
pub fn spawn(request: BuildRequest) -> Result<(JoinHandle<()>, Receiver<BuildEvent>)> {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("ocforge-build".into())
        .spawn(move || {
            let output = request.output_dir.join("EFI");
            let tools = ProcessTools::new(request.tools_dir.clone());
            let event = match run(&request, &tools, &tx) {
                Ok(summary) => BuildEvent::Finished { ok: true, output, summary: Some(summary), error: None },
                Err(e) => {
                    log::error!("build failed: {e:?}");
                    BuildEvent::Finished { ok: false, output, summary: None, error: Some(format!("{e:#}")) }
                }
            };
            let _ = tx.send(event);
        })
        .context("failed to start the build thread")?;
    Ok((handle, rx))
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Runs every step in order on the calling thread.
pub fn run(request: &BuildRequest, tools: &dyn ExternalTools, tx: &Sender<BuildEvent>) -> Result<BuildSummary> {
    let mut progress = Reporter { tx, step: 0 };
    let report = &request.report;
    let plan = &request.plan;
    let settings = &request.settings;
    let efi = request.output_dir.join("EFI");
    let oc = efi.join("OC");

    progress.step();
    if efi.exists() {
        fs::remove_dir_all(&efi).with_context(|| format!("removing {}", efi.display()))?;
    }
    fs::create_dir_all(&request.output_dir).with_context(|| format!("creating {}", request.output_dir.display()))?;

    progress.step();
    let base = request.base_dir.join("EFI");
    if !base.is_dir() {
        anyhow::bail!("OpenCore base {} is missing; run `ocforge fetch` first", base.display());
    }
    ocforge_kext::copy_tree(&base, &efi)?;

    progress.step();
    let template = oc.join("config.plist");
    let mut config = read_config(&template)?;

    progress.step();
    let mut tables = AcpiTables::default();
    if let Some(dir) = request.acpi_dir.as_deref().filter(|d| d.exists()) {
        let loaded = tables.load(dir, tools).with_context(|| format!("loading ACPI tables from {}", dir.display()))?;
        progress.log(format!("loaded {} ACPI tables", loaded.loaded.len()));
        for failed in &loaded.failed {
            progress.log(format!("could not disassemble {}", failed.display()));
        }
    } else {
        progress.log("no ACPI tables given; only table-independent patches apply".into());
    }
    let ctx = GenContext::new(&tables, report, plan.target, &plan.disabled);
    let mut selected = default_selection(&ctx);
    apply_overrides(&mut selected, &settings.enable_acpi_patches, &settings.disable_acpi_patches);
    let acpi_dir = oc.join("ACPI");
    fs::create_dir_all(&acpi_dir).with_context(|| format!("creating {}", acpi_dir.display()))?;
    let acpi = ocforge_acpigen::run(&ctx, &selected, &acpi_dir, tools);
    apply_acpi_patches(&mut config, &acpi);
    for name in &acpi.failed {
        progress.log(format!("ACPI patch {name} was disabled"));
    }

    progress.step();
    let outcome = plan.select_kexts(report, settings);
    for skipped in &outcome.skipped {
        progress.log(format!("kext {} skipped: {:?}", skipped.name, skipped.reason));
    }
    let kexts_dir = oc.join("Kexts");
    let installed = install(&outcome.selected, &request.kexts_dir, &kexts_dir)?;
    let bundles = discover(&kexts_dir)?;
    let latest = os::latest(settings.include_beta);
    let add = emit(&bundles, &outcome.selected, latest, os::lowest());
    apply_kernel_entries(&mut config, &add, &outcome.block_entries);

    progress.step();
    let identity_file = request.output_dir.join(SMBIOS_FILE);
    let model = settings.smbios_model.as_deref().unwrap_or_else(|| models::select_model(report, plan.target));
    let mut rng = StdRng::from_entropy();
    let identity = smbios::resolve(&identity_file, settings.preserve_smbios, model, tools, &mut rng)?;
    if settings.preserve_smbios {
        // A kept identity keeps alcid and the rest of the random picks too.
        rng = StdRng::seed_from_u64(identity.seed());
    }
    if identity.is_placeholder() {
        progress.log("serial generator unavailable; placeholder serials written".into());
    }
    let amd_patches = load_amd_patches(report, request.amd_patches.as_deref())?;
    let options = settings.config_options();
    let input = ConfigInput {
        report,
        target: plan.target,
        disabled: &plan.disabled,
        kexts: &outcome.selected,
        smbios: &identity,
        amd_patches: amd_patches.as_ref(),
        options: &options,
    };
    assemble(&mut config, &input, &mut rng);

    progress.step();
    let pruned = prune::prune(&oc, &config)?;

    progress.step();
    write_config(&template, &config)?;
    smbios::save(&identity_file, &identity)?;

    Ok(BuildSummary {
        smbios_model: identity.system_product_name,
        acpi_tables: acpi.add.len(),
        acpi_failed: acpi.failed,
        kexts: add.iter().map(|e| e.bundle_path.clone()).collect(),
        missing_kexts: installed.missing,
        pruned: pruned.removed.len(),
        config: template,
    })
}

fn load_amd_patches(report: &HardwareReport, path: Option<&Path>) -> Result<Option<KernelPatchSet>> {
    if report.cpu.is_intel() {
        return Ok(None);
    }
    let Some(path) = path.filter(|p| p.is_file()) else {
        log::warn!("AMD CPU but the kernel patch set is not cached");
        return Ok(None);
    };
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(KernelPatchSet::from_plist_bytes(&bytes)?))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ocforge_core::{CompileOutcome, Disassembly, ToolError};

    use super::*;

    fn report(codename: &str, gpu: &str) -> HardwareReport {
        HardwareReport::from_json(&format!(
            r#"{{
            "Motherboard": {{"Name": "Board", "Chipset": "Z490", "Platform": "Desktop"}},
            "CPU": {{"Manufacturer": "Intel", "Processor Name": "Intel Core i9-10900K", "Codename": "{codename}",
                     "Core Count": "10", "CPU Count": "1", "SIMD Features": "SSE4.1, SSE4.2, AVX, AVX2"}},
            "GPU": {{{gpu}}}
        }}"#
        ))
        .unwrap()
    }

    const NVIDIA_TURING: &str = r#""GeForce GTX 1650": {"Bus Type": "PCI", "Device ID": "10DE-1F82",
        "Device Type": "Discrete GPU", "Codename": "TU117", "PCI Path": "PciRoot(0x0)/Pci(0x1,0x0)/Pci(0x0,0x0)"},
        "Intel UHD Graphics 630": {"Bus Type": "PCI", "Device ID": "8086-9BC5", "Device Type": "Integrated GPU",
        "Codename": "Comet Lake"}"#;

    #[test]
    fn explicit_release_wins() {
        let settings = Settings { macos_version: Some("Ventura".into()), ..Settings::default() };
        let plan = BuildPlan::new(&report("Comet Lake", ""), &settings, Some("Sonoma")).unwrap();
        assert_eq!(plan.target.major, 23);
        assert!(plan.target_name().contains("Sonoma"));
    }

    #[test]
    fn unknown_release_is_an_error() {
        assert!(BuildPlan::new(&report("Comet Lake", ""), &Settings::default(), Some("Cheetah")).is_err());
    }

    #[test]
    fn unsupported_gpu_is_disabled() {
        let plan = BuildPlan::new(&report("Comet Lake", NVIDIA_TURING), &Settings::default(), Some("Sonoma")).unwrap();
        let names: Vec<&str> = plan.disabled.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["GeForce GTX 1650"]);
    }

    #[test]
    fn user_disabled_devices_are_honoured() {
        let settings = Settings { disabled_devices: vec!["Intel UHD Graphics 630".into()], ..Settings::default() };
        let plan = BuildPlan::new(&report("Comet Lake", NVIDIA_TURING), &settings, Some("Sonoma")).unwrap();
        assert!(plan.disabled.iter().any(|d| d.name == "Intel UHD Graphics 630"));
    }

    #[test]
    fn missing_base_fails_the_build_with_one_event() {
        let dir = tempfile::tempdir().unwrap();
        let report = report("Comet Lake", "");
        let plan = BuildPlan::new(&report, &Settings::default(), Some("Sonoma")).unwrap();
        let request = BuildRequest {
            report,
            plan,
            settings: Settings::default(),
            acpi_dir: None,
            base_dir: dir.path().join("nowhere"),
            kexts_dir: dir.path().join("kexts"),
            amd_patches: None,
            output_dir: dir.path().join("out"),
            tools_dir: Some(dir.path().join("tools")),
        };
        let (handle, rx) = spawn(request).unwrap();
        handle.join().unwrap();
        let events: Vec<BuildEvent> = rx.iter().collect();
        let finished: Vec<&BuildEvent> = events.iter().filter(|e| matches!(e, BuildEvent::Finished { .. })).collect();
        assert_eq!(finished.len(), 1);
        match finished[0] {
            BuildEvent::Finished { ok, error, .. } => {
                assert!(!ok);
                assert!(error.as_deref().unwrap_or_default().contains("ocforge fetch"));
            }
            _ => unreachable!(),
        }
        assert!(events.iter().any(|e| matches!(e, BuildEvent::Progress { step: 2, .. })));
    }

    struct FixedSerials;

    impl ExternalTools for FixedSerials {
        fn compile_asl(&self, _dsl: &Path) -> Result<CompileOutcome, ToolError> {
            Err(ToolError::NotFound("iasl".into()))
        }

        fn disassemble(&self, _tables: &[PathBuf], _scratch: &Path) -> Result<Disassembly, ToolError> {
            Err(ToolError::NotFound("iasl".into()))
        }

        fn generate_serial(&self, _model: &str) -> Result<Vec<(String, String)>, ToolError> {
            Ok(vec![("C02XL0GSJ2PL".into(), "C02037102CDJWNKA8".into())])
        }
    }

    /// Every file under `root` with its contents.
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    files.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn preserved_identity_rebuilds_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        fs::create_dir_all(base.join("EFI").join("OC")).unwrap();
        write_config(&base.join("EFI").join("OC").join("config.plist"), &plist::Dictionary::new()).unwrap();
        let settings = Settings { preserve_smbios: true, ..Settings::default() };
        let out = dir.path().join("out");

        let build = || {
            let report = report("Comet Lake", "");
            let plan = BuildPlan::new(&report, &settings, Some("Sonoma")).unwrap();
            let request = BuildRequest {
                report,
                plan,
                settings: settings.clone(),
                acpi_dir: None,
                base_dir: base.clone(),
                kexts_dir: dir.path().join("kexts"),
                amd_patches: None,
                output_dir: out.clone(),
                tools_dir: None,
            };
            let (tx, _rx) = mpsc::channel();
            run(&request, &FixedSerials, &tx).unwrap();
            snapshot(&out.join("EFI"))
        };
        let first = build();
        assert!(out.join(SMBIOS_FILE).is_file());
        let second = build();

        assert!(first.contains_key(Path::new("OC/config.plist")));
        assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
        for (path, bytes) in &first {
            assert!(second[path] == *bytes, "{} differs between builds", path.display());
        }
    }
}
