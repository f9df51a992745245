//! NVRAM variables: `boot-args`, `csr-active-config` and friends.

use plist::{Dictionary, Value};
use rand::Rng;
use rand::seq::SliceRandom;

use ocforge_core::os;
use ocforge_hardware::ids::audio;
use ocforge_hardware::ids::chipset;
use ocforge_hardware::ids::cpu::IntelGen;
use ocforge_hardware::ids::gpu::GpuFamily;
use ocforge_hardware::report::vendor;

use crate::ConfigInput;
use crate::dict::{path, section, string};

/// Apple boot variables.
pub const APPLE_BOOT: &str = "7C436110-AB2A-4BBB-A880-FE41995C9F82";
/// `OpenCanopy` and boot UI variables.
pub const APPLE_UI: &str = "4D1EDE05-38C7-4A6A-9CC6-4BCCA8B38C14";
/// `RestrictEvents` variables.
pub const RESTRICT_EVENTS: &str = "4D1FDA02-38C7-4A6A-9CC6-4BCCA8B30102";

bitflags::bitflags! {
    /// System Integrity Protection bits of `csr-active-config`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SipFlags: u32 {
        /// Unsigned kexts.
        const ALLOW_UNTRUSTED_KEXTS = 0x0001;
        /// Writes to protected paths.
        const ALLOW_UNRESTRICTED_FS = 0x0002;
        /// `task_for_pid` on protected processes.
        const ALLOW_TASK_FOR_PID = 0x0004;
        /// Kernel debugger.
        const ALLOW_KERNEL_DEBUGGER = 0x0008;
        /// Apple-internal policy.
        const ALLOW_APPLE_INTERNAL = 0x0010;
        /// Unrestricted DTrace.
        const ALLOW_UNRESTRICTED_DTRACE = 0x0020;
        /// Unrestricted NVRAM.
        const ALLOW_UNRESTRICTED_NVRAM = 0x0040;
        /// Device configuration.
        const ALLOW_DEVICE_CONFIGURATION = 0x0080;
        /// Any recovery OS.
        const ALLOW_ANY_RECOVERY_OS = 0x0100;
        /// Unapproved kexts.
        const ALLOW_UNAPPROVED_KEXTS = 0x0200;
        /// Executable policy override.
        const ALLOW_EXECUTABLE_POLICY_OVERRIDE = 0x0400;
        /// Unauthenticated root volume.
        const ALLOW_UNAUTHENTICATED_ROOT = 0x0800;
    }
}

/// `csr-active-config` for `major`.
#[must_use]
pub fn sip_for(major: u32) -> SipFlags {
    match major {
        20.. => SipFlags::ALLOW_UNTRUSTED_KEXTS | SipFlags::ALLOW_UNRESTRICTED_FS | SipFlags::ALLOW_UNAUTHENTICATED_ROOT,
        18..=19 => SipFlags::from_bits_truncate(0x07FF),
        _ => SipFlags::from_bits_truncate(0x03FF),
    }
}

/// Picks an `alcid` from the first codec with known layouts.
fn audio_layout<R: Rng + ?Sized>(input: &ConfigInput<'_>, rng: &mut R) -> Option<u8> {
    if !input.kexts.contains("AppleALC") {
        return None;
    }
    input
        .report
        .sound
        .iter()
        .filter(|(name, _)| input.kept(name))
        .filter_map(|(_, s)| s.info.device_id)
        .find_map(audio::layouts)
        .and_then(|layouts| layouts.choose(rng).copied())
}

/// Builds `boot-args`.
pub(crate) fn boot_args<R: Rng + ?Sized>(input: &ConfigInput<'_>, rng: &mut R) -> String {
    let report = input.report;
    let major = input.major();
    let generation = input.intel_gen();
    let mut args: Vec<String> = vec!["-v".into(), "debug=0x100".into(), "keepsyms=1".into()];

    if let Some(layout) = audio_layout(input, rng) {
        args.push(format!("alcid={layout}"));
    }
    let chipset = report.motherboard.chipset.as_str();
    if chipset::is_hedt(chipset) || chipset::is_6_or_7_series(chipset) {
        args.push("npci=0x2000".into());
    }
    if input.kexts.contains("RestrictEvents") {
        let mut rev = Vec::new();
        if major >= 23 {
            rev.push("sbvmm");
        }
        if input.options.custom_cpu_name.is_some() {
            rev.push("cpuname");
        }
        if !rev.is_empty() {
            args.push(format!("revpatch={}", rev.join(",")));
        }
    }
    if input.kexts.contains("CpuTopologyRebuild") {
        args.push("-ctrsmt".into());
    }

    let igpu = report.integrated_gpu().filter(|(name, g)| input.kept(name) && g.vendor() == Some(vendor::INTEL));
    if igpu.is_some() {
        match generation {
            Some(IntelGen::IceLake) => args.extend(["-igfxcdc", "-igfxdvmt", "-igfxdbeo"].map(String::from)),
            Some(g) if g >= IntelGen::CoffeeLake => args.push("igfxonln=1".into()),
            _ => {}
        }
        if input.is_laptop() {
            match generation {
                Some(g) if g >= IntelGen::IceLake => args.push("-igfxblt".into()),
                Some(g) if g >= IntelGen::CoffeeLake => args.push("-igfxblr".into()),
                _ => {}
            }
        }
    }

    for (name, gpu) in report.discrete_gpus().filter(|(name, _)| input.kept(name)) {
        let family = gpu.vendor().and_then(|v| GpuFamily::classify(v, gpu.codename.as_deref().unwrap_or_default()));
        match family {
            Some(GpuFamily::AmdNavi1) => args.push("agdpmod=pikera".into()),
            Some(GpuFamily::NvidiaWebDriver) => args.push("nvda_drv_vrl=1".into()),
            Some(GpuFamily::NvidiaKepler) if major >= 21 => args.push("amfi=0x80".into()),
            _ => {}
        }
        log::debug!("{name}: {family:?}");
    }

    if report.has_i2c_input() && input.is_amd() {
        args.push("-vi2c-force-polling".into());
    }
    if os::by_darwin(major).is_some_and(|r| r.beta) {
        args.push("-lilubetaall".into());
    }
    args.dedup();
    args.join(" ")
}

pub(crate) fn fill<R: Rng + ?Sized>(config: &mut Dictionary, input: &ConfigInput<'_>, rng: &mut R) {
    let args = boot_args(input, rng);
    log::info!("boot-args: {args}");
    let sip = sip_for(input.major());

    let add = path(config, &["NVRAM", "Add"]);
    let boot = section(add, APPLE_BOOT);
    boot.insert("boot-args".into(), string(args));
    boot.insert("csr-active-config".into(), Value::Data(sip.bits().to_le_bytes().to_vec()));
    boot.insert("prev-lang:kbd".into(), string("en-US:0"));
    boot.insert("run-efi-updater".into(), string("No"));
    section(add, APPLE_UI).insert("DefaultBackgroundColor".into(), Value::Data(vec![0; 4]));
    if let Some(name) = &input.options.custom_cpu_name {
        let rev = section(add, RESTRICT_EVENTS);
        rev.insert("revcpu".into(), Value::Data(vec![1]));
        rev.insert("revcpuname".into(), string(name.as_str()));
    }

    let delete_keys: Vec<(String, Vec<String>)> = add
        .iter()
        .filter_map(|(guid, vars)| vars.as_dictionary().map(|d| (guid.clone(), d.keys().cloned().collect())))
        .collect();
    let delete = path(config, &["NVRAM", "Delete"]);
    for (guid, keys) in delete_keys {
        delete.insert(guid, Value::Array(keys.into_iter().map(Value::String).collect()));
    }
    path(config, &["NVRAM"]).insert("WriteFlash".into(), Value::Boolean(true));
}
