//! `Kernel.Emulate`, `Kernel.Patch` and `Kernel.Quirks`.
//!
//! `Kernel.Add` and `Kernel.Block` belong to the kext emitter.

use plist::{Dictionary, Value};

use ocforge_hardware::ids::cpu::{self, IntelGen};

use crate::ConfigInput;
use crate::dict::{path, set_flags};
use crate::patches;

/// `Cpuid1Data` leading dwords of supported CPUs.
mod cpuid {
    pub const IVY_BRIDGE: [u8; 4] = [0xA9, 0x06, 0x03, 0x00];
    pub const HASWELL: [u8; 4] = [0xC3, 0x06, 0x03, 0x00];
    pub const BROADWELL: [u8; 4] = [0xD4, 0x06, 0x03, 0x00];
    pub const COFFEE_LAKE: [u8; 4] = [0xEA, 0x06, 0x09, 0x00];
    pub const COMET_LAKE: [u8; 4] = [0x55, 0x06, 0x0A, 0x00];
}

/// The CPUID to report, if the real one is not accepted by `target`.
fn spoofed_cpuid(input: &ConfigInput<'_>) -> Option<[u8; 4]> {
    let generation = input.intel_gen()?;
    let codename = input.report.cpu.codename.as_str();
    if generation >= IntelGen::Haswell && cpu::is_low_end(&input.report.cpu.processor_name) {
        return Some(cpuid::IVY_BRIDGE);
    }
    if cpu::is_hedt_codename(codename) {
        return match generation {
            IntelGen::Haswell => Some(cpuid::HASWELL),
            IntelGen::Broadwell => Some(cpuid::BROADWELL),
            _ => None,
        };
    }
    match generation {
        IntelGen::CometLake if input.major() == 18 => Some(cpuid::COFFEE_LAKE),
        IntelGen::CometLake => Some(cpuid::COMET_LAKE),
        g if g >= IntelGen::AlderLake => Some(cpuid::COMET_LAKE),
        _ => None,
    }
}

fn padded(head: [u8; 4]) -> Value {
    let mut bytes = vec![0u8; 16];
    bytes[..4].copy_from_slice(&head);
    Value::Data(bytes)
}

fn emulate(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let emulate = path(config, &["Kernel", "Emulate"]);
    match spoofed_cpuid(input) {
        Some(head) => {
            log::info!("spoofing CPUID {}", hex::encode_upper(head));
            emulate.insert("Cpuid1Data".into(), padded(head));
            emulate.insert("Cpuid1Mask".into(), padded([0xFF; 4]));
        }
        None => {
            emulate.insert("Cpuid1Data".into(), Value::Data(Vec::new()));
            emulate.insert("Cpuid1Mask".into(), Value::Data(Vec::new()));
        }
    }
    emulate.insert("DummyPowerManagement".into(), Value::Boolean(input.is_amd()));
}

fn kernel_patches(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let cores = input.report.cpu.core_count;
    let mut list = Vec::new();
    if input.is_amd() {
        match input.amd_patches {
            Some(set) => list.extend(set.for_cores(cores)),
            None => log::warn!("AMD CPU but no kernel patch set was fetched"),
        }
    } else {
        if input.options.tsc_sync {
            list.extend(patches::tsc_sync_patches());
        }
        if input.intel_gen().is_some_and(|g| g >= IntelGen::RaptorLake) && cores > 6 {
            list.push(patches::force_ht_patch(cores * 2));
        }
    }
    log::debug!("Kernel.Patch: {} entries", list.len());
    path(config, &["Kernel"]).insert("Patch".into(), Value::Array(list));
}

fn quirks(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let intel = !input.is_amd();
    let hybrid = input.intel_gen().is_some_and(|g| g >= IntelGen::AlderLake);
    let q = path(config, &["Kernel", "Quirks"]);
    set_flags(
        q,
        &[
            ("AppleCpuPmCfgLock", intel && input.intel_gen().is_some_and(|g| g <= IntelGen::IvyBridge)),
            ("AppleXcpmCfgLock", intel),
            ("DisableIoMapper", true),
            ("DisableLinkeditJettison", true),
            ("LapicKernelPanic", input.board_is("HP")),
            ("PanicNoKextDump", true),
            ("PowerTimeoutKernelPanic", true),
            ("ProvideCurrentCpuInfo", input.is_amd() || hybrid),
            ("XhciPortLimit", false),
        ],
    );
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    emulate(config, input);
    kernel_patches(config, input);
    quirks(config, input);
}
