//! Inputs every patch function reads.

use ocforge_acpi::AcpiTables;
use ocforge_core::DarwinVersion;
use ocforge_hardware::compat::{self, DeviceCompat};
use ocforge_hardware::ids::cpu::{self, IntelGen};
use ocforge_hardware::report::CpuVendor;
use ocforge_hardware::HardwareReport;

/// Borrowed view of one generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenContext<'a> {
    /// Loaded firmware tables.
    pub tables: &'a AcpiTables,
    /// Hardware report of the target machine.
    pub report: &'a HardwareReport,
    /// Target macOS as a Darwin version.
    pub target: DarwinVersion,
    /// Devices to switch off on Darwin.
    pub disabled: &'a [DeviceCompat],
}

impl<'a> GenContext<'a> {
    /// Bundles the inputs.
    #[must_use]
    pub fn new(
        tables: &'a AcpiTables,
        report: &'a HardwareReport,
        target: DarwinVersion,
        disabled: &'a [DeviceCompat],
    ) -> Self {
        Self { tables, report, target, disabled }
    }

    /// Returns `true` for Intel CPUs.
    #[must_use]
    pub fn is_intel(&self) -> bool {
        self.report.cpu.manufacturer == CpuVendor::Intel
    }

    /// Returns `true` for AMD CPUs.
    #[must_use]
    pub fn is_amd(&self) -> bool {
        self.report.cpu.manufacturer == CpuVendor::Amd
    }

    /// Intel generation, `None` on AMD or unknown codenames.
    #[must_use]
    pub fn intel_gen(&self) -> Option<IntelGen> {
        if self.is_intel() { IntelGen::from_codename(&self.report.cpu.codename) } else { None }
    }

    /// Returns `true` on laptops.
    #[must_use]
    pub fn is_laptop(&self) -> bool {
        self.report.is_laptop()
    }

    /// Returns `true` on HEDT platforms.
    #[must_use]
    pub fn is_hedt(&self) -> bool {
        compat::is_hedt(self.report)
    }

    /// Returns `true` for Haswell-E/Broadwell-E class CPUs specifically.
    #[must_use]
    pub fn is_hedt_cpu(&self) -> bool {
        self.is_intel() && cpu::is_hedt_codename(&self.report.cpu.codename)
    }

    /// Board chipset name.
    #[must_use]
    pub fn chipset(&self) -> &str {
        &self.report.motherboard.chipset
    }

    /// Target Darwin major.
    #[must_use]
    pub fn target_major(&self) -> u32 {
        self.target.major
    }
}
