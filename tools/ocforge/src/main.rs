//! ocforge: OpenCore EFI generator.
//!
//! Turns a hardware report (and optionally a dump of the machine's ACPI
//! tables) into a ready-to-boot `EFI` folder: ACPI patches, kexts and a
//! filled-in `config.plist`.
//!
//! Pipeline: validate report → plan target → fetch releases →
//!           ACPI → kexts → config → prune → write.

mod build;
mod cache;
mod cli;
mod fetch;
mod prune;
mod settings;
mod verbose;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;

use ocforge_acpi::AcpiTables;
use ocforge_acpigen::{CATALOG, GenContext, apply_overrides, default_selection};
use ocforge_core::{ProcessTools, os};
use ocforge_hardware::{HardwareReport, compat, validate};
use ocforge_kext::catalog::CATALOG as KEXT_CATALOG;

use build::{BuildEvent, BuildPlan, BuildRequest};
use fetch::Fetcher;
use settings::LoadedSettings;
use verbose::{Timer, dprintln, vprintln};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    match cli.command {
        cli::Command::Validate(ref args) => cmd_validate(&args.report),
        cli::Command::Compat(ref args) => cmd_compat(args),
        cli::Command::Acpi(ref args) => cmd_acpi(&cli, args),
        cli::Command::Build(ref args) => cmd_build(&cli, args),
        cli::Command::Fetch(ref args) => cmd_fetch(&cli, args),
        cli::Command::Clean(ref args) => cmd_clean(&cli, args),
    }
}

// ===========================================================================
// Inputs
// ===========================================================================

/// Read, validate and type the hardware report.
fn load_report(path: &Path) -> Result<HardwareReport> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ocforge_hardware::load_report(&text).with_context(|| format!("in {}", path.display()))
}

/// Settings, report and plan for the commands that target a release.
fn prepare(cli: &cli::Cli, args: &cli::TargetArgs) -> Result<(LoadedSettings, HardwareReport, BuildPlan)> {
    let loaded = settings::load(cli.settings.as_deref(), Some(&args.report))?;
    let report = load_report(&args.report)?;
    let plan = BuildPlan::new(&report, &loaded.settings, args.macos.as_deref())?;
    dprintln!("Target: {}", plan.target_name());
    if plan.needs_legacy_patcher {
        dprintln!("  Some devices need the legacy root patcher after installation.");
    }
    Ok((loaded, report, plan))
}

/// ACPI dump location: `--acpi`, else `ACPI` next to the report.
fn acpi_dir(args: &cli::TargetArgs) -> Option<PathBuf> {
    args.acpi.clone().or_else(|| {
        let dir = args.report.parent().unwrap_or_else(|| Path::new(".")).join("ACPI");
        dir.is_dir().then_some(dir)
    })
}

fn tools_for(loaded: &LoadedSettings) -> ProcessTools {
    let dir = loaded.tools_dir().unwrap_or_else(|| fetch::macserial_dir(&loaded.cache_dir()));
    ProcessTools::new(Some(dir))
}

// ===========================================================================
// Commands
// ===========================================================================

/// Check a report against the schema and print every finding.
fn cmd_validate(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let outcome = validate::validate(&value);

    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    for error in &outcome.errors {
        println!("  error: {error}");
    }
    if !outcome.is_valid() {
        bail!("{} failed validation with {} error(s)", path.display(), outcome.errors.len());
    }
    println!("{} is valid ({} warning(s))", path.display(), outcome.warnings.len());
    Ok(())
}

/// Print the supported range of every device and the machine.
fn cmd_compat(args: &cli::CompatArgs) -> Result<()> {
    let report = load_report(&args.report)?;
    let matrix = compat::check(&report, args.with_patcher);

    let range = |r: Option<compat::OsRange>| r.map_or_else(|| "unsupported".to_string(), |r| r.to_string());
    let cpu = if args.with_patcher { matrix.cpu_extended.or(matrix.cpu) } else { matrix.cpu };
    println!("CPU  {:<40} {}", report.cpu.processor_name, range(cpu));
    for device in &matrix.devices {
        println!("{:<5}{:<40} {}", short_category(device.category), device.name, range(device.range(args.with_patcher)));
    }
    println!();
    println!("Overall: {}", range(matrix.overall));
    match compat::default_target(&matrix, false) {
        Some(major) => println!("Default target: {}", os::by_darwin(major).map_or("unknown", |r| r.name)),
        None => bail!("no macOS release supports this machine"),
    }
    Ok(())
}

fn short_category(category: &str) -> &str {
    match category {
        "Network" => "NET",
        "Sound" => "SND",
        "Storage Controllers" => "STO",
        "SD Controller" => "SD",
        other => other,
    }
}

/// List the ACPI patch catalog with the default selection, or generate the
/// selected patches into `--out`.
fn cmd_acpi(cli: &cli::Cli, args: &cli::AcpiArgs) -> Result<()> {
    let (loaded, report, plan) = prepare(cli, &args.target)?;
    let tools = tools_for(&loaded);

    let mut tables = AcpiTables::default();
    if let Some(dir) = acpi_dir(&args.target) {
        let _t = Timer::start("ACPI disassembly");
        let loaded_tables = tables.load(&dir, &tools)?;
        vprintln!("  {} tables loaded, {} failed", loaded_tables.loaded.len(), loaded_tables.failed.len());
    }
    let ctx = GenContext::new(&tables, &report, plan.target, &plan.disabled);
    let mut selected = default_selection(&ctx);
    apply_overrides(&mut selected, &loaded.settings.enable_acpi_patches, &loaded.settings.disable_acpi_patches);

    let Some(out) = &args.out else {
        for patch in CATALOG {
            let mark = if selected.contains(patch.name) { 'x' } else { ' ' };
            println!("[{mark}] {:<24} {}", patch.name, patch.description);
        }
        return Ok(());
    };

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let output = ocforge_acpigen::run(&ctx, &selected, out, &tools);
    for add in &output.add {
        println!("  {} {}", if add.enabled { "+" } else { "-" }, add.path);
    }
    for patch in ocforge_acpigen::apply::ordered_patches(&output.patch) {
        println!("  patch: {}", patch.comment);
    }
    for name in &output.failed {
        println!("  failed: {name}");
    }
    Ok(())
}

/// Download everything a build of this report needs.
fn cmd_fetch(cli: &cli::Cli, args: &cli::FetchArgs) -> Result<()> {
    let (loaded, report, plan) = prepare(cli, &args.target)?;
    let outcome = plan.select_kexts(&report, &loaded.settings);
    fetch_all(&loaded, &report, &outcome.selected, cli.force, false, args.all)?;
    dprintln!("Cache: {}", loaded.cache_dir().display());
    Ok(())
}

/// Fetches OpenCore, kexts, extras and AMD patches; returns the paths the
/// build needs.
fn fetch_all(
    loaded: &LoadedSettings,
    report: &HardwareReport,
    selection: &ocforge_kext::KextSelection,
    force: bool,
    offline: bool,
    all: bool,
) -> Result<(PathBuf, Option<PathBuf>)> {
    let cache_dir = loaded.cache_dir();
    let mut fetcher = Fetcher::new(&cache_dir, force, offline);

    dprintln!("Fetching OpenCore...");
    let base = if offline {
        cache_dir.join(fetch::BASE_DIR)
    } else {
        fetch::fetch_opencore(&mut fetcher)?
    };

    dprintln!("Fetching kexts...");
    let kexts: Vec<&ocforge_kext::KextInfo> = if all { KEXT_CATALOG.iter().collect() } else { selection.iter().collect() };
    let summary = fetch::fetch_kexts(&mut fetcher, kexts.iter().copied());
    vprintln!("  {} kext releases ready", summary.fetched.len());
    for (product, reason) in &summary.failed {
        dprintln!("  {product}: {reason}");
    }
    if let Some(extras) = loaded.extras_dir() {
        let copied = fetch::copy_extras(&extras, &cache_dir, kexts.iter().copied())?;
        vprintln!("  {} extra kexts copied", copied.len());
    }

    let amd = if report.cpu.is_intel() {
        None
    } else {
        match fetch::fetch_amd_patches(&mut fetcher) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("AMD kernel patches: {e:#}");
                None
            }
        }
    };
    Ok((base, amd))
}

/// Build the EFI folder on a worker thread and render its progress.
fn cmd_build(cli: &cli::Cli, args: &cli::BuildArgs) -> Result<()> {
    let _t = Timer::start("build");
    let (loaded, report, plan) = prepare(cli, &args.target)?;
    let outcome = plan.select_kexts(&report, &loaded.settings);
    let (base_dir, amd_patches) = fetch_all(&loaded, &report, &outcome.selected, cli.force, args.offline, false)?;

    let output_dir = args.output.clone().unwrap_or_else(|| loaded.output_dir());
    let request = BuildRequest {
        report,
        plan,
        settings: loaded.settings.clone(),
        acpi_dir: acpi_dir(&args.target),
        base_dir,
        kexts_dir: loaded.cache_dir().join(fetch::KEXTS_DIR),
        amd_patches,
        output_dir,
        tools_dir: loaded.tools_dir().or_else(|| Some(fetch::macserial_dir(&loaded.cache_dir()))),
    };

    let (handle, events) = build::spawn(request)?;
    let mut result = None;
    for event in events {
        match event {
            BuildEvent::Progress { step, total, label } => dprintln!("[{step}/{total}] {label}..."),
            BuildEvent::Log(line) => dprintln!("  {line}"),
            BuildEvent::Finished { ok, output, summary, error } => result = Some((ok, output, summary, error)),
        }
    }
    if handle.join().is_err() {
        bail!("build thread panicked");
    }

    match result {
        Some((true, output, Some(summary), _)) => {
            println!();
            println!("Built {}", output.display());
            println!("  SMBIOS:  {}", summary.smbios_model);
            println!("  ACPI:    {} table(s)", summary.acpi_tables);
            println!("  Kexts:   {}", summary.kexts.join(", "));
            if !summary.acpi_failed.is_empty() {
                println!("  Disabled ACPI patches: {}", summary.acpi_failed.join(", "));
            }
            if !summary.missing_kexts.is_empty() {
                println!("  Missing kexts: {}", summary.missing_kexts.join(", "));
            }
            vprintln!("  Pruned {} asset(s); config at {}", summary.pruned, summary.config.display());
            Ok(())
        }
        Some((_, output, _, error)) => {
            bail!("build failed: {} (partial output left in {})", error.unwrap_or_default(), output.display())
        }
        None => bail!("build ended without a result"),
    }
}

/// Remove build output, and the download cache with `--cache`.
fn cmd_clean(cli: &cli::Cli, args: &cli::CleanArgs) -> Result<()> {
    let loaded = settings::load(cli.settings.as_deref(), args.report.as_deref())?;
    let mut targets = vec![loaded.output_dir()];
    if args.cache {
        targets.push(loaded.cache_dir());
    }
    for dir in targets {
        if dir.exists() {
            println!("Removing {}...", dir.display());
            fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
        }
    }
    println!("Clean complete.");
    Ok(())
}
