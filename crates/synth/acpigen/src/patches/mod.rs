//! The patch catalog.
//!
//! Each entry is a plain function from [`GenContext`] to an optional
//! [`PatchResult`]. Functions never write to disk; [`crate::run`] commits
//! what they return.

mod clock;
mod cpu;
mod devices;
mod disable;
mod ec;
mod irq;
mod osi;
mod power;

use std::fmt::Write as _;

use ocforge_acpi::{AcpiPath, Patch};

use crate::context::GenContext;
use crate::lookup::StaVar;
use crate::result::PatchResult;
use crate::ssdt::{asl_path, darwin_sta, external, indent, scope};
use crate::GenError;

/// Signature shared by every patch function.
pub type PatchFn = fn(&GenContext<'_>) -> Result<Option<PatchResult>, GenError>;

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct AcpiPatch {
    /// Display name, also the selection key.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// The generator.
    pub function: PatchFn,
}

/// Every patch, in the order they run.
pub const CATALOG: &[AcpiPatch] = &[
    AcpiPatch { name: "ALS0", description: "Fake ambient light sensor", function: devices::ambient_light_sensor },
    AcpiPatch { name: "APIC", description: "Match the first MADT processor id to the first processor", function: cpu::fix_apic_processor_id },
    AcpiPatch { name: "BUS0", description: "SMBus compatibility device", function: devices::smbus },
    AcpiPatch { name: "CMOS", description: "Fix HP real-time clock power loss (005) post error", function: clock::cmos },
    AcpiPatch { name: "Disable Devices", description: "Hide unsupported PCI devices from macOS", function: disable::disable_unsupported_devices },
    AcpiPatch { name: "DMAC", description: "Fake DMA controller", function: devices::dma_controller },
    AcpiPatch { name: "Drop CpuPm", description: "Drop firmware CpuPm and Cpu0Ist tables", function: cpu::drop_cpu_tables },
    AcpiPatch { name: "FakeEC", description: "Fake embedded controller", function: ec::fake_embedded_controller },
    AcpiPatch { name: "FixHPET", description: "Resolve IRQ conflicts", function: irq::fix_irq_conflicts },
    AcpiPatch { name: "GPI0", description: "Enable the GPIO controller for I2C input devices", function: devices::gpio },
    AcpiPatch { name: "IMEI", description: "Fake Intel MEI device id", function: devices::imei },
    AcpiPatch { name: "MCHC", description: "Memory controller device", function: devices::memory_controller },
    AcpiPatch { name: "PMC", description: "Native NVRAM on 300-series chipsets", function: power::pmc },
    AcpiPatch { name: "PNLF", description: "Backlight control device", function: power::backlight },
    AcpiPatch { name: "PLUG", description: "Enable CPU power management (plugin-type)", function: cpu::enable_cpu_power_management },
    AcpiPatch { name: "PRW", description: "Fix instant wake", function: power::instant_wake },
    AcpiPatch { name: "RMNE", description: "Null ethernet device", function: devices::null_ethernet },
    AcpiPatch { name: "RTC0", description: "Fix the RTC range on HEDT boards", function: clock::rtc_range },
    AcpiPatch { name: "RTCAWAC", description: "Enable the legacy RTC over AWAC", function: clock::fix_system_clock_awac },
    AcpiPatch { name: "UNC", description: "Disable uncore bridges", function: cpu::uncore_bridges },
    AcpiPatch { name: "USB Reset", description: "Reset USB hub devices", function: power::usb_reset },
    AcpiPatch { name: "USBX", description: "USB power properties", function: power::usb_power },
    AcpiPatch { name: "XOSI", description: "Report a Windows OSI to the firmware", function: osi::xosi },
];

/// Looks up a catalog entry, ignoring case.
#[must_use]
pub fn find(name: &str) -> Option<&'static AcpiPatch> {
    CATALOG.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// A `_DSM` that returns `properties` as a property package.
///
/// Values are ASL expressions (`One`, `"ethernet"`, `Buffer (...) {...}`).
pub(crate) fn dsm(properties: &[(&str, String)]) -> String {
    let mut pkg = String::new();
    for (i, (key, value)) in properties.iter().enumerate() {
        let sep = if i + 1 == properties.len() { "" } else { "," };
        let _ = write!(pkg, "        \"{key}\",\n        {value}{sep}\n");
    }
    format!(
        "\
Method (_DSM, 4, NotSerialized)  // _DSM: Device-Specific Method
{{
    If ((Arg2 == Zero))
    {{
        Return (Buffer (One)
        {{
             0x03
        }})
    }}

    Return (Package (0x{:02X})
    {{
{pkg}    }})
}}
",
        properties.len() * 2
    )
}

/// Externals and a `Scope` block replacing the `_STA` of `var`'s device
/// with one that returns `darwin` on macOS and the original status
/// elsewhere.
///
/// Returns `None` when the device keeps an `_STA` that was not renamed,
/// since a second `_STA` would not compile.
pub(crate) fn shadow_sta(var: &StaVar, darwin: &str) -> Option<(Vec<String>, String)> {
    if var.sta.is_some() && !var.is_renamed() {
        return None;
    }
    let path = &var.device.path;
    let mut externals = vec![external(path, "DeviceObj")];
    externals.extend(var.xsta_external(path));
    let body = scope(path, &darwin_sta(darwin, &format!("Return ({})", var.original_status())));
    Some((externals, body))
}

/// Externals and a root-level block that sets the firmware gate `var` to
/// `One` on macOS.
pub(crate) fn flip_var(ctx: &GenContext<'_>, var: &str) -> (Vec<String>, String) {
    let path = ctx.tables.get_name_paths(var, None).into_iter().next().map(|e| e.path);
    let name = path.as_ref().map_or_else(|| var.to_string(), asl_path);
    let body = format!("If (_OSI (\"Darwin\"))\n{{\n    {name} = One\n}}\n");
    (vec![format!("External ({name}, IntObj)")], scope(&AcpiPath::root(), &body))
}

/// Enables devices gated by `var`: flips the gate when any `_STA` reads
/// it, otherwise shadows every conditional `_STA` to return `darwin`.
///
/// Returns `None` when every device is already unconditionally present.
pub(crate) fn shadow_or_flip(
    ctx: &GenContext<'_>,
    vars: &[StaVar],
    var: &str,
    darwin: &str,
) -> Option<(Vec<String>, String, Vec<Patch>)> {
    if vars.iter().any(|v| v.references_var) {
        log::info!("flipping {var} on macOS");
        let (externals, body) = flip_var(ctx, var);
        return Some((externals, body, Vec::new()));
    }
    let mut externals = Vec::new();
    let mut body = String::new();
    let mut patches = Vec::new();
    for v in vars.iter().filter(|v| !v.trivially_present()) {
        if let Some((ext, block)) = shadow_sta(v, darwin) {
            externals.extend(ext);
            body.push_str(&block);
            patches.extend(v.patches.iter().cloned());
        }
    }
    (!body.is_empty()).then_some((externals, body, patches))
}

/// `Device (<name>) { <inner> }` with `inner` indented one level.
pub(crate) fn device_block(name: &str, inner: &str) -> String {
    format!("Device ({name})\n{{\n{}}}\n", indent(inner, 1))
}

/// A fixed 16-bit `IO` descriptor, indented for a `ResourceTemplate` inside
/// a `Device`.
pub(crate) fn io_descriptor(min: u16, length: u8) -> String {
    format!(
        "        IO (Decode16,\n            0x{min:04X},             // Range Minimum\n            0x{min:04X},             // Range Maximum\n            0x01,               // Alignment\n            0x{length:02X},               // Length\n            )\n"
    )
}

/// `Buffer (n) { ... }` for raw bytes.
pub(crate) fn buffer(bytes: &[u8]) -> String {
    let body: Vec<String> = bytes.iter().map(|b| format!("0x{b:02X}")).collect();
    format!("Buffer (0x{:02X})\n        {{\n             {}\n        }}", bytes.len(), body.join(", "))
}

/// `Buffer () { "text" }` as used for string-valued device properties.
pub(crate) fn string_buffer(text: &str) -> String {
    format!("Buffer ()\n        {{\n            \"{text}\"\n        }}")
}
