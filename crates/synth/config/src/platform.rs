//! `PlatformInfo`.

use plist::{Dictionary, Value};

use crate::ConfigInput;
use crate::dict::{int, path, set_flags, string};

/// `ProcessorType` for a custom CPU name: Xeon W for workstation models,
/// Core i7 otherwise. Zero leaves the detected value alone.
fn processor_type(input: &ConfigInput<'_>) -> i64 {
    if input.options.custom_cpu_name.is_none() {
        return 0;
    }
    let model = input.smbios.system_product_name.as_str();
    if model.starts_with("MacPro") || model.starts_with("iMacPro") { 0x0F01 } else { 0x0601 }
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let smbios = input.smbios;
    let generic = path(config, &["PlatformInfo", "Generic"]);
    set_flags(generic, &[("AdviseFeatures", false), ("MaxBIOSVersion", false), ("SpoofVendor", true)]);
    generic.insert("MLB".into(), string(smbios.mlb.as_str()));
    generic.insert("ProcessorType".into(), int(processor_type(input)));
    generic.insert("ROM".into(), Value::Data(smbios.rom.to_vec()));
    generic.insert("SystemMemoryStatus".into(), string("Auto"));
    generic.insert("SystemProductName".into(), string(smbios.system_product_name.as_str()));
    generic.insert("SystemSerialNumber".into(), string(smbios.system_serial_number.as_str()));
    generic.insert("SystemUUID".into(), string(smbios.system_uuid.as_str()));

    let info = path(config, &["PlatformInfo"]);
    set_flags(info, &[("Automatic", true), ("UpdateDataHub", true), ("UpdateNVRAM", true), ("UpdateSMBIOS", true)]);
    info.insert("CustomMemory".into(), Value::Boolean(false));
    info.insert("UpdateSMBIOSMode".into(), string("Custom"));
    log::info!("SMBIOS {}", smbios.system_product_name);
}
