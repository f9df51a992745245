//! `Misc.Boot`, `Misc.Debug`, `Misc.Security` and `Misc.Tools`.

use plist::{Dictionary, Value};

use crate::ConfigInput;
use crate::dict::{dict, int, path, set_flags, string};

/// `SecureBootModel` for `major`: Apple Secure Boot only where it is known to
/// work with injected kexts.
#[must_use]
pub(crate) fn secure_boot_model(major: u32) -> &'static str {
    if (20..23).contains(&major) { "Default" } else { "Disabled" }
}

fn tool(name: &str, flavour: &str) -> Value {
    dict([
        ("Arguments", string("")),
        ("Auxiliary", Value::Boolean(true)),
        ("Comment", string(name)),
        ("Enabled", Value::Boolean(true)),
        ("Flavour", string(flavour)),
        ("FullNvramAccess", Value::Boolean(false)),
        ("Name", string(name)),
        ("Path", string(name)),
        ("RealPath", Value::Boolean(false)),
        ("TextMode", Value::Boolean(false)),
    ])
}

pub(crate) fn fill(config: &mut Dictionary, input: &ConfigInput<'_>) {
    let boot = path(config, &["Misc", "Boot"]);
    boot.insert("PickerMode".into(), string("External"));
    boot.insert("PickerVariant".into(), string(input.options.picker_variant.as_str()));
    boot.insert("PickerAttributes".into(), int(17));
    boot.insert("Timeout".into(), int(5));
    set_flags(boot, &[("HideAuxiliary", true), ("PollAppleHotKeys", true), ("ShowPicker", true)]);

    let debug = path(config, &["Misc", "Debug"]);
    set_flags(debug, &[("AppleDebug", true), ("ApplePanic", true), ("DisableWatchDog", true)]);
    debug.insert("Target".into(), int(3));

    let model = secure_boot_model(input.major());
    let security = path(config, &["Misc", "Security"]);
    set_flags(security, &[("AllowSetDefault", true), ("BlacklistAppleUpdate", true)]);
    security.insert("ExposeSensitiveData".into(), int(6));
    security.insert("ScanPolicy".into(), int(0));
    security.insert("SecureBootModel".into(), string(model));
    security.insert("Vault".into(), string("Optional"));
    log::info!("SecureBootModel {model}");

    path(config, &["Misc"]).insert("Tools".into(), Value::Array(vec![tool("OpenShell.efi", "OpenShell:UEFIShell:Shell")]));
}
