//! Storage, card reader and USB controller ids.

use super::matches;
use crate::DeviceId;
use crate::report::vendor;

/// NVMe drives known to panic or stall under macOS.
const UNSUPPORTED_NVME: &[(u16, u16)] = &[
    (0x8086, 0xF1A5),
    (0x8086, 0xF1A8),
    (0x144D, 0xA809),
    (0x1344, 0x5405),
    (0x1C5C, 0x174A),
];

/// Intel RST / RAID mode controllers.
const INTEL_RAID: &[u16] = &[0x2822, 0x2826, 0x282A, 0x9D07, 0xA102, 0xA182, 0xA352];

const REALTEK_CARD_READERS: &[u16] =
    &[0x5227, 0x5228, 0x5229, 0x522A, 0x5249, 0x524A, 0x525A, 0x5260, 0x5286, 0x5287];

/// XHCI controllers that need `XHCI-unsupported`.
const UNSUPPORTED_XHCI: &[u16] = &[0x8D31, 0xA2AF, 0xA36D, 0x9DED, 0xA3AF, 0x06ED, 0x43ED, 0x02ED];

/// Returns `true` for storage controllers macOS cannot use.
#[must_use]
pub fn is_unsupported_storage(id: DeviceId) -> bool {
    UNSUPPORTED_NVME.contains(&(id.vendor, id.device)) || matches(id, vendor::INTEL, INTEL_RAID)
}

/// Returns `true` for Realtek PCIe card readers.
#[must_use]
pub fn is_realtek_card_reader(id: DeviceId) -> bool {
    matches(id, vendor::REALTEK, REALTEK_CARD_READERS)
}

/// Returns `true` for Intel XHCI controllers without a native personality.
#[must_use]
pub fn needs_xhci_unsupported(id: DeviceId) -> bool {
    matches(id, vendor::INTEL, UNSUPPORTED_XHCI)
}
