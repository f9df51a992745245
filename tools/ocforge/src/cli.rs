//! Command-line interface definitions for ocforge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// OpenCore EFI generator.
#[derive(Parser)]
#[command(name = "ocforge", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (default: `ocforge.toml` next to the report).
    #[arg(long, short = 's', global = true)]
    pub settings: Option<PathBuf>,

    /// Re-download archives even when the cache history is current.
    #[arg(long, short = 'f', global = true)]
    pub force: bool,

    /// Show only warnings, errors and the final summary.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with timings and lookup diagnostics.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Check a hardware report against the schema.
    Validate(ReportArgs),
    /// Show which macOS releases each device supports.
    Compat(CompatArgs),
    /// List the ACPI patches, or generate them into a directory.
    Acpi(AcpiArgs),
    /// Build the EFI folder.
    Build(BuildArgs),
    /// Download OpenCore, the kexts the report needs and the AMD patches.
    Fetch(FetchArgs),
    /// Remove build output.
    Clean(CleanArgs),
}

/// A hardware report path.
#[derive(Parser)]
pub struct ReportArgs {
    /// Hardware report JSON.
    pub report: PathBuf,
}

/// Arguments for the `compat` subcommand.
#[derive(Parser)]
pub struct CompatArgs {
    /// Hardware report JSON.
    pub report: PathBuf,

    /// Count releases reachable with the legacy root patcher.
    #[arg(long)]
    pub with_patcher: bool,
}

/// Options shared by the commands that target a macOS release.
#[derive(Parser)]
pub struct TargetArgs {
    /// Hardware report JSON.
    pub report: PathBuf,

    /// Target macOS: name (`Sonoma`), version (`14`) or Darwin (`23.0.0`).
    #[arg(long, short = 'm')]
    pub macos: Option<String>,

    /// Directory of dumped ACPI tables (default: `ACPI` next to the report).
    #[arg(long)]
    pub acpi: Option<PathBuf>,
}

/// Arguments for the `acpi` subcommand.
#[derive(Parser)]
pub struct AcpiArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Generate the selected patches into this directory instead of listing.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Arguments for the `build` subcommand.
#[derive(Parser)]
pub struct BuildArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output directory (overrides the settings file).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Build from the cache without touching the network.
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the `fetch` subcommand.
#[derive(Parser)]
pub struct FetchArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Fetch every kext in the catalog, not only the selected ones.
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the `clean` subcommand.
#[derive(Parser)]
pub struct CleanArgs {
    /// Hardware report whose settings name the directories.
    pub report: Option<PathBuf>,

    /// Also remove the download cache.
    #[arg(long)]
    pub cache: bool,
}
