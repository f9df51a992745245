//! Console verbosity and library log routing.
//!
//! Three output levels controlled by CLI flags:
//! - **Quiet** (`-q`): warnings, errors and the final summary only
//! - **Default** (no flag): build steps, decisions, warnings and the summary
//! - **Verbose** (`-v`): everything, including lookup diagnostics and timings
//!
//! Library crates log through `log`; [`init`] installs `env_logger` at the
//! matching level. `RUST_LOG` overrides it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Output verbosity level.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Default => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Global verbosity level, set once at startup.
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Sets the verbosity level and installs the logger.
pub fn init(quiet: bool, verbose: bool) {
    let level = if quiet {
        Verbosity::Quiet
    } else if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Default
    };
    VERBOSITY.store(level as u8, Ordering::Relaxed);

    let env = env_logger::Env::default().default_filter_or(level.log_filter());
    let installed = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(level == Verbosity::Verbose)
        .try_init();
    if installed.is_err() {
        eprintln!("warning: a logger was already installed");
    }
}

/// Returns the current verbosity level.
pub fn verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Default,
    }
}

/// Returns `true` if verbose mode is active.
pub fn is_verbose() -> bool {
    verbosity() == Verbosity::Verbose
}

/// Returns `true` if quiet mode is active.
pub fn is_quiet() -> bool {
    verbosity() == Verbosity::Quiet
}

/// Print a message only when verbose mode is enabled.
///
/// Usage mirrors `println!`:
/// ```ignore
/// vprintln!("  {} tables loaded", count);
/// ```
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            println!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// Print a message at default verbosity and above (suppressed in quiet mode).
///
/// Usage mirrors `println!`:
/// ```ignore
/// dprintln!("  Fetching {}...", product);
/// ```
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if !$crate::verbose::is_quiet() {
            println!($($arg)*);
        }
    };
}

pub(crate) use dprintln;

/// RAII timer that prints elapsed duration on drop when verbose mode is active.
///
/// ```ignore
/// let _t = Timer::start("ACPI disassembly");
/// // ... work ...
/// // prints "  ACPI disassembly: 1.2s" on drop
/// ```
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation.
    pub fn start(label: &'static str) -> Self {
        Self { label, start: Instant::now() }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if is_verbose() {
            println!("  {}: {:.1?}", self.label, self.start.elapsed());
        }
    }
}
