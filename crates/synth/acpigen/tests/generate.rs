//! End-to-end runs of the patch catalog over a synthetic firmware.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ocforge_acpi::{AcpiTables, Patch, fixture};
use ocforge_acpigen::apply::ordered_patches;
use ocforge_acpigen::{AcpiOutput, GenContext, apply_acpi_patches, run};
use ocforge_core::{CompileOutcome, DarwinVersion, Disassembly, ExternalTools, ToolError};
use ocforge_hardware::HardwareReport;

/// Compiler stand-in that succeeds unless the stem is listed in `broken`.
struct FakeCompiler {
    broken: Vec<&'static str>,
}

impl ExternalTools for FakeCompiler {
    fn compile_asl(&self, dsl: &Path) -> Result<CompileOutcome, ToolError> {
        let stem = dsl.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if self.broken.contains(&stem) {
            return Ok(CompileOutcome { aml: None, log: format!("{stem}.dsl: syntax error") });
        }
        let aml = dsl.with_extension("aml");
        std::fs::write(&aml, b"SSDT").map_err(|source| ToolError::Io { tool: "iasl".into(), source })?;
        Ok(CompileOutcome { aml: Some(aml), log: String::new() })
    }

    fn disassemble(&self, _tables: &[PathBuf], _scratch: &Path) -> Result<Disassembly, ToolError> {
        Ok(Disassembly::default())
    }

    fn generate_serial(&self, _model: &str) -> Result<Vec<(String, String)>, ToolError> {
        Err(ToolError::NotFound("macserial".into()))
    }
}

fn desktop() -> HardwareReport {
    HardwareReport::from_json(
        r#"{
        "Motherboard": {"Name": "Z390 AORUS", "Chipset": "Z390", "Platform": "Desktop"},
        "CPU": {"Manufacturer": "Intel", "Processor Name": "Intel Core i7-9700K", "Codename": "Coffee Lake",
                "Core Count": "8", "CPU Count": "1", "SIMD Features": "SSE4.2, AVX, AVX2"}
    }"#,
    )
    .unwrap()
}

/// A DSDT with a legacy processor, an EC called `EC`, an AWAC clock and no
/// RTC, plus Windows `_OSI` checks.
fn firmware() -> AcpiTables {
    AcpiTables::from_tables(vec![fixture::table(
        "DSDT",
        b"DSDT",
        &[
            ("Processor (CPU0, 0x01, 0x00000410, 0x06) {}", &[0x5B, 0x83, 0x0B, b'C', b'P', b'U', b'0', 0x01]),
            ("Scope (_SB.PCI0)", &[0x10, 0x4F]),
            ("{", &[]),
            ("    Device (LPCB)", &[0x5B, 0x82, 0x4A, b'L', b'P', b'C', b'B']),
            ("    {", &[]),
            ("        Device (EC)", &[0x5B, 0x82, 0x30, b'E', b'C', b'_', b'_']),
            ("        {", &[]),
            ("            Name (_HID, EisaId (\"PNP0C09\"))", &[0x08, b'_', b'H', b'I', b'D', 0x0C, 0x41, 0xD0, 0x0C, 0x09]),
            ("            Method (_STA, 0, NotSerialized)", &[0x14, 0x08, b'_', b'S', b'T', b'A', 0x00]),
            ("            {", &[]),
            ("                Return (ECON)", &[0xA4, b'E', b'C', b'O', b'N']),
            ("            }", &[]),
            ("        }", &[]),
            ("        Device (AWAC)", &[0x5B, 0x82, 0x31, b'A', b'W', b'A', b'C']),
            ("        {", &[]),
            ("            Name (_HID, \"ACPI000E\")", &[0x08, b'_', b'H', b'I', b'D', 0x0D]),
            ("            Method (_STA, 0, NotSerialized)", &[0x14, 0x08, b'_', b'S', b'T', b'A', 0x00]),
            ("            {", &[]),
            ("                Return (0x0F)", &[0xA4, 0x0A, 0x0F]),
            ("            }", &[]),
            ("        }", &[]),
            ("    }", &[]),
            ("}", &[]),
            ("If (_OSI (\"Windows 2015\"))", &[0xA0, 0x10, b'_', b'O', b'S', b'I']),
            ("{", &[]),
            ("}", &[]),
        ],
    )])
}

fn selection(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn generate(tables: &AcpiTables, report: &HardwareReport, names: &[&str], tools: &FakeCompiler, dir: &Path) -> AcpiOutput {
    let ctx = GenContext::new(tables, report, DarwinVersion::new(23, 0, 0), &[]);
    run(&ctx, &selection(names), dir, tools)
}

fn replace_all(haystack: &mut [u8], find: &[u8], replace: &[u8]) {
    let mut i = 0;
    while i + find.len() <= haystack.len() {
        if &haystack[i..i + find.len()] == find {
            haystack[i..i + find.len()].copy_from_slice(replace);
            i += find.len();
        } else {
            i += 1;
        }
    }
}

fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn plugin_type_on_a_classic_processor() {
    let dir = tempfile::tempdir().unwrap();
    let tables = firmware();
    let report = desktop();
    let output = generate(&tables, &report, &["PLUG"], &FakeCompiler { broken: vec![] }, dir.path());

    assert_eq!(output.add.len(), 1);
    assert_eq!(output.add[0].path, "SSDT-PLUG.aml");
    assert!(output.add[0].enabled);
    assert!(output.add[0].comment.contains("plugin-type"), "comment: {}", output.add[0].comment);
    assert!(dir.path().join("SSDT-PLUG.aml").is_file());
    assert!(!dir.path().join("SSDT-PLUG.dsl").exists(), "compiled sources are removed");
}

#[test]
fn awac_without_rtc_is_replaced_by_a_fake_rtc() {
    let dir = tempfile::tempdir().unwrap();
    let tables = firmware();
    let report = desktop();
    let tools = FakeCompiler { broken: vec!["SSDT-RTCAWAC"] };
    let output = generate(&tables, &report, &["RTCAWAC"], &tools, dir.path());

    // Keep the source around so it can be inspected.
    let src = std::fs::read_to_string(dir.path().join("SSDT-RTCAWAC.dsl")).unwrap();
    assert!(src.contains("External (\\_SB.PCI0.LPCB.AWAC, DeviceObj)"));
    assert!(src.contains("Scope (\\_SB.PCI0.LPCB)"));
    assert!(src.contains("Device (RTC0)"));
    assert!(src.contains("0x0070"));
    assert!(src.contains("IRQNoFlags ()\n") && src.contains("{8}"));
    assert!(src.contains("Return (Zero)"));
    assert_eq!(output.failed, ["RTCAWAC"]);
}

#[test]
fn patches_hit_exactly_one_site_in_boot_order() {
    let dir = tempfile::tempdir().unwrap();
    let tables = firmware();
    let report = desktop();
    let output = generate(
        &tables,
        &report,
        &["FakeEC", "RTCAWAC", "XOSI", "PLUG"],
        &FakeCompiler { broken: vec![] },
        dir.path(),
    );
    assert!(output.failed.is_empty(), "failed: {:?}", output.failed);
    assert!(!output.patch.is_empty());

    // Replay the patches the way the bootloader does, in written order.
    let mut aml = tables.get("DSDT").unwrap().raw().to_vec();
    for patch in ordered_patches(&output.patch) {
        assert_eq!(patch.find.len(), patch.replace.len(), "{}", patch.comment);
        if !patch.global {
            assert_eq!(occurrences(&aml, &patch.find), 1, "`{}` must match exactly once", patch.comment);
        }
        replace_all(&mut aml, &patch.find, &patch.replace);
    }
    assert_eq!(occurrences(&aml, b"_OSI"), 0);
    assert_eq!(occurrences(&aml, b"EC0_"), 1);
    assert_eq!(occurrences(&aml, b"XSTA"), 2);
}

#[test]
fn prerequisite_renames_precede_their_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let tables = firmware();
    let report = desktop();
    let output = generate(&tables, &report, &["FakeEC", "XOSI"], &FakeCompiler { broken: vec![] }, dir.path());

    let mut config = plist::Dictionary::new();
    apply_acpi_patches(&mut config, &output);
    let comments: Vec<String> = config
        .get("ACPI")
        .and_then(plist::Value::as_dictionary)
        .and_then(|acpi| acpi.get("Patch"))
        .and_then(plist::Value::as_array)
        .unwrap()
        .iter()
        .map(|p| p.as_dictionary().and_then(|d| d.get("Comment")).and_then(plist::Value::as_string).unwrap().to_string())
        .collect();
    let at = |needle: &str| comments.iter().position(|c| c.contains(needle)).unwrap();
    assert!(at("EC to EC0") < at("_STA to XSTA"), "{comments:?}");
    assert!(at("_OSI to XOSI") > at("EC to EC0"));
}

#[test]
fn a_failed_compile_disables_the_whole_result() {
    let dir = tempfile::tempdir().unwrap();
    let tables = firmware();
    let report = desktop();
    let tools = FakeCompiler { broken: vec!["SSDT-EC"] };
    let output = generate(&tables, &report, &["FakeEC", "PLUG"], &tools, dir.path());

    assert_eq!(output.failed, ["FakeEC"]);
    let ec: Vec<&Patch> = output.patch.iter().filter(|p| p.comment.contains("EC")).collect();
    assert_eq!(ec.len(), 2);
    assert!(ec.iter().all(|p| !p.enabled));
    let add = |path: &str| output.add.iter().find(|a| a.path == path).unwrap();
    assert!(!add("SSDT-EC.aml").enabled);
    assert!(add("SSDT-PLUG.aml").enabled);
    assert!(dir.path().join("SSDT-EC.dsl").is_file());
}
