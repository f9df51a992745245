//! Integration tests for the ocforge CLI.
//!
//! These tests invoke the ocforge binary as a subprocess against a fixture
//! hardware report. The commands that download releases or run `iasl` and
//! `macserial` are marked `#[ignore]` because they need network access.
//!
//! Run with: `cargo test --test integration -- --ignored`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Locate the compiled ocforge binary.
fn ocforge_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ocforge"))
}

/// Path to the Comet Lake fixture report.
fn fixture_report() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/comet-lake/report.json")
}

/// Copies the fixture into `dir` so settings, cache and output land there.
fn staged_report(dir: &Path) -> PathBuf {
    let report = dir.join("report.json");
    fs::copy(fixture_report(), &report).expect("failed to stage the fixture report");
    report
}

fn run(args: &[&str]) -> Output {
    Command::new(ocforge_binary()).args(args).output().expect("failed to execute ocforge")
}

fn assert_success(output: &Output, what: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "ocforge {what} failed (exit={:?}):\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status.code(),
    );
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_the_fixture() {
    let report = fixture_report();
    let output = run(&["validate", report.to_str().unwrap()]);
    assert_success(&output, "validate");
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));
}

#[test]
fn validate_rejects_a_report_without_a_cpu() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    fs::write(&report, r#"{"Motherboard": {"Name": "X", "Chipset": "Z490", "Platform": "Desktop"}}"#).unwrap();

    let output = run(&["validate", report.to_str().unwrap()]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CPU: missing required category"), "{stdout}");
}

#[test]
fn compat_prints_every_device_and_a_target() {
    let report = fixture_report();
    let output = run(&["compat", report.to_str().unwrap()]);
    assert_success(&output, "compat");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Intel Core i9-10900K"), "{stdout}");
    assert!(stdout.contains("AMD Radeon RX 6600 XT"), "{stdout}");
    assert!(stdout.contains("Overall:"), "{stdout}");
    assert!(stdout.contains("Default target:"), "{stdout}");
}

#[test]
fn acpi_lists_the_catalog_without_tables() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    let output = run(&["acpi", report.to_str().unwrap(), "--macos", "Ventura"]);
    assert_success(&output, "acpi");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PLUG"), "{stdout}");
    assert!(stdout.contains("USBX"), "{stdout}");
}

#[test]
fn unknown_release_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    let output = run(&["acpi", report.to_str().unwrap(), "--macos", "Cheetah"]);
    assert!(!output.status.success());
}

#[test]
fn offline_build_without_a_cache_points_at_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    let output = run(&["build", report.to_str().unwrap(), "--offline"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ocforge fetch"), "{stderr}");
}

#[test]
fn clean_removes_the_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    fs::create_dir_all(dir.path().join("Results/EFI/OC")).unwrap();

    let output = run(&["clean", report.to_str().unwrap()]);
    assert_success(&output, "clean");
    assert!(!dir.path().join("Results").exists());
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn build_produces_an_efi_folder() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    let output = run(&["build", report.to_str().unwrap(), "--macos", "Ventura"]);
    assert_success(&output, "build");

    let oc = dir.path().join("Results/EFI/OC");
    assert!(oc.join("config.plist").is_file(), "config.plist missing under {}", oc.display());
    assert!(oc.join("OpenCore.efi").is_file());
    assert!(oc.join("Kexts/Lilu.kext").is_dir());
    assert!(dir.path().join("Results/smbios.json").is_file());
}

#[test]
#[ignore]
fn fetch_records_download_history() {
    let dir = tempfile::tempdir().unwrap();
    let report = staged_report(dir.path());
    let output = run(&["fetch", report.to_str().unwrap(), "--macos", "Ventura"]);
    assert_success(&output, "fetch");

    let cache = dir.path().join(".ocforge-cache");
    assert!(cache.join("download-history.json").is_file());
    assert!(cache.join("base/EFI/OC/config.plist").is_file());
}
