//! Curated device id tables.
//!
//! Everything here is compiled in. Lookups take the report's [`DeviceId`]
//! or codename strings and answer "what is this part" questions; the policy
//! built on top of the answers lives in [`crate::compat`] and the synthesis
//! crates.
//!
//! [`DeviceId`]: crate::DeviceId

pub mod audio;
pub mod chipset;
pub mod cpu;
pub mod gpu;
pub mod network;
pub mod storage;

use crate::DeviceId;

/// Returns `true` if `id` has vendor `vendor` and its device half is in `devices`.
pub(crate) fn matches(id: DeviceId, vendor: u16, devices: &[u16]) -> bool {
    id.vendor == vendor && devices.contains(&id.device)
}
