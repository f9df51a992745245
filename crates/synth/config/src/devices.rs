//! `DeviceProperties.Add`: iGPU framebuffer, built-in Ethernet and
//! disabled discrete GPUs.

use plist::{Dictionary, Value};

use ocforge_hardware::ids::cpu::IntelGen;
use ocforge_hardware::ids::network;
use ocforge_hardware::report::vendor;

use crate::ConfigInput;
use crate::dict::path;

const IGPU_PATH: &str = "PciRoot(0x0)/Pci(0x2,0x0)";

/// `AAPL,ig-platform-id` (little endian) and an optional `device-id`
/// override, keyed by generation, form factor and whether the iGPU drives a
/// display.
struct Framebuffer {
    platform_id: u32,
    device_id: Option<u16>,
}

const fn fb(platform_id: u32) -> Option<Framebuffer> {
    Some(Framebuffer { platform_id, device_id: None })
}

fn framebuffer(generation: IntelGen, laptop: bool, headless: bool) -> Option<Framebuffer> {
    use IntelGen as G;
    match (generation, laptop, headless) {
        (G::IvyBridge, false, false) => fb(0x0166_000A),
        (G::IvyBridge, false, true) => fb(0x0162_0007),
        (G::IvyBridge, true, _) => fb(0x0166_0003),
        (G::Haswell, false, false) => fb(0x0D22_0003),
        (G::Haswell, false, true) => fb(0x0412_0004),
        (G::Haswell, true, _) => fb(0x0A26_0006),
        (G::Broadwell, false, _) => fb(0x1622_0007),
        (G::Broadwell, true, _) => fb(0x1626_0006),
        (G::Skylake, false, false) => fb(0x1912_0000),
        (G::Skylake, false, true) => fb(0x1912_0001),
        (G::Skylake, true, _) => fb(0x1916_0000),
        (G::KabyLake, false, false) => fb(0x5912_0000),
        (G::KabyLake, false, true) => fb(0x5912_0003),
        (G::KabyLake, true, _) => fb(0x591B_0000),
        (G::CoffeeLake, false, false) => fb(0x3E9B_0007),
        (G::CoffeeLake, false, true) => fb(0x3E91_0003),
        (G::CoffeeLake, true, _) => fb(0x3EA5_0009),
        (G::CometLake, false, false) => Some(Framebuffer { platform_id: 0x3E9B_0007, device_id: Some(0x9BC8) }),
        (G::CometLake, false, true) => fb(0x9BC8_0003),
        (G::CometLake, true, _) => fb(0x3E9B_0000),
        (G::IceLake, true, _) => fb(0x8A52_0000),
        _ => None,
    }
}

fn data(bytes: &[u8]) -> Value {
    Value::Data(bytes.to_vec())
}

fn igpu(input: &ConfigInput<'_>, add: &mut Dictionary) {
    let Some((name, gpu)) = input.report.integrated_gpu() else { return };
    if gpu.vendor() != Some(vendor::INTEL) || !input.kept(name) {
        return;
    }
    let Some(generation) = input.intel_gen() else { return };
    let headless = input.report.discrete_gpus().any(|(n, _)| input.kept(n));
    let Some(fb) = framebuffer(generation, input.is_laptop(), headless) else {
        log::info!("no framebuffer for {generation:?} graphics");
        return;
    };

    let mut props = Dictionary::new();
    props.insert("AAPL,ig-platform-id".into(), data(&fb.platform_id.to_le_bytes()));
    if let Some(id) = fb.device_id {
        props.insert("device-id".into(), data(&u32::from(id).to_le_bytes()));
    }
    if !headless && generation >= IntelGen::Skylake {
        props.insert("framebuffer-patch-enable".into(), data(&1u32.to_le_bytes()));
        props.insert("framebuffer-stolenmem".into(), data(&0x0130_0000u32.to_le_bytes()));
    }
    let path = gpu.info.pci_path.clone().unwrap_or_else(|| IGPU_PATH.to_string());
    log::info!("iGPU framebuffer {:08X} at {path}", fb.platform_id);
    add.insert(path, Value::Dictionary(props));
}

fn builtin_ethernet(input: &ConfigInput<'_>, add: &mut Dictionary) {
    let wired = input.report.network.iter().find(|(name, r)| {
        input.kept(name) && r.info.device_id.and_then(network::classify).is_some_and(|a| !a.is_wireless())
    });
    if let Some(pci) = wired.and_then(|(_, r)| r.info.pci_path.as_ref()) {
        let mut props = Dictionary::new();
        props.insert("built-in".into(), data(&[0x01]));
        add.insert(pci.clone(), Value::Dictionary(props));
    }
}

fn disabled_gpus(input: &ConfigInput<'_>, add: &mut Dictionary) {
    for (name, gpu) in input.report.discrete_gpus() {
        if input.kept(name) {
            continue;
        }
        let Some(pci) = &gpu.info.pci_path else {
            log::warn!("{name}: no PCI path, cannot disable it");
            continue;
        };
        let mut props = Dictionary::new();
        props.insert("disable-gpu-support".into(), data(&1u32.to_le_bytes()));
        add.insert(pci.clone(), Value::Dictionary(props));
        log::info!("{name}: disabled through DeviceProperties");
    }
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let add = path(config, &["DeviceProperties", "Add"]);
    igpu(input, add);
    builtin_ethernet(input, add);
    disabled_gpus(input, add);
}
