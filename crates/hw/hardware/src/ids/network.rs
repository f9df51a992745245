//! Wi-Fi and Ethernet adapters.

use super::matches;
use crate::DeviceId;
use crate::report::vendor;

/// A network chip family and the driver that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    /// Intel Wi-Fi (itlwm / AirportItlwm).
    IntelWifi,
    /// Broadcom Wi-Fi with an Apple driver through Ventura (BCM4360 family).
    BroadcomWifi,
    /// Older Broadcom Wi-Fi dropped after High Sierra (BCM4331 era).
    BroadcomWifiLegacy,
    /// Atheros Wi-Fi (AR9xxx).
    AtherosWifi,
    /// Intel client Ethernet (IntelMausi).
    IntelMausi,
    /// Intel I211 / 82576 class (AppleIGB).
    IntelIgb,
    /// Intel I225 / I226 (AppleIGC).
    IntelIgc,
    /// Intel I210, native.
    IntelI210,
    /// Realtek RTL8111 / 8168.
    Realtek8111,
    /// Realtek RTL8125 2.5GbE.
    Realtek8125,
    /// Realtek RTL810x fast Ethernet.
    Realtek8100,
    /// Atheros / Killer E2200 family.
    AtherosE2200,
    /// Broadcom BCM57xx Ethernet, native.
    BroadcomEthernet,
    /// Aquantia AQC107/113, native.
    Aquantia,
}

const INTEL_WIFI: &[u16] = &[
    0x08B1, 0x08B2, 0x095A, 0x095B, 0x24F3, 0x24F4, 0x24FD, 0x2526, 0x2723, 0x2725, 0x2729, 0x271B, 0x271C,
    0x02F0, 0x06F0, 0x34F0, 0x3DF0, 0x43F0, 0x4DF0, 0xA0F0, 0x51F0, 0x54F0, 0x7A70, 0x7AF0, 0x7E40,
];
const BROADCOM_WIFI: &[u16] = &[0x43A0, 0x43A3, 0x43B1, 0x43B2, 0x43BA, 0x43DC];
const BROADCOM_WIFI_LEGACY: &[u16] = &[0x4311, 0x4312, 0x432B, 0x4331, 0x4353, 0x4357];
const ATHEROS_WIFI: &[u16] = &[0x0029, 0x002A, 0x002B, 0x002C, 0x002D, 0x0030, 0x0032, 0x0034];

const INTEL_MAUSI: &[u16] = &[
    0x1502, 0x1503, 0x153A, 0x153B, 0x1559, 0x155A, 0x156F, 0x1570, 0x15A0, 0x15A1, 0x15A2, 0x15A3, 0x15B7,
    0x15B8, 0x15B9, 0x15BB, 0x15BC, 0x15BD, 0x15BE, 0x15D6, 0x15D7, 0x15D8, 0x15E3, 0x15F9, 0x15FA, 0x15FB,
    0x15FC, 0x0D4C, 0x0D4D, 0x0D4E, 0x0D4F, 0x0D53, 0x0D55, 0x1A1C, 0x1A1D, 0x1A1E, 0x1A1F,
];
const INTEL_IGB: &[u16] = &[0x10C9, 0x10E6, 0x10E7, 0x10E8, 0x1526, 0x1536, 0x1537, 0x1538, 0x1539, 0x157B, 0x157C];
const INTEL_IGC: &[u16] = &[0x15F2, 0x15F3, 0x0D9F, 0x125B, 0x125C, 0x125D];
const INTEL_I210: &[u16] = &[0x1533];

const REALTEK_8111: &[u16] = &[0x8168, 0x8167];
const REALTEK_8125: &[u16] = &[0x8125, 0x3000];
const REALTEK_8100: &[u16] = &[0x8136];
const ATHEROS_E2200: &[u16] = &[0x1091, 0x10A0, 0x10A1, 0xE091, 0xE0A1, 0xE0B1];
const BROADCOM_ETHERNET: &[u16] = &[0x1682, 0x1684, 0x1686, 0x1687, 0x1691, 0x16A0, 0x16B0, 0x16B1, 0x16B4];
const AQUANTIA: &[u16] = &[0x07B1, 0x87B1, 0xD107, 0x94C0];

/// Classifies a network adapter by PCI id.
#[must_use]
pub fn classify(id: DeviceId) -> Option<Adapter> {
    use vendor::{AQUANTIA as AQ, ATHEROS, ATHEROS_ETH, BROADCOM, INTEL, REALTEK};
    let table: &[(u16, &[u16], Adapter)] = &[
        (INTEL, INTEL_WIFI, Adapter::IntelWifi),
        (BROADCOM, BROADCOM_WIFI, Adapter::BroadcomWifi),
        (BROADCOM, BROADCOM_WIFI_LEGACY, Adapter::BroadcomWifiLegacy),
        (ATHEROS, ATHEROS_WIFI, Adapter::AtherosWifi),
        (INTEL, INTEL_MAUSI, Adapter::IntelMausi),
        (INTEL, INTEL_IGB, Adapter::IntelIgb),
        (INTEL, INTEL_IGC, Adapter::IntelIgc),
        (INTEL, INTEL_I210, Adapter::IntelI210),
        (REALTEK, REALTEK_8111, Adapter::Realtek8111),
        (REALTEK, REALTEK_8125, Adapter::Realtek8125),
        (REALTEK, REALTEK_8100, Adapter::Realtek8100),
        (ATHEROS_ETH, ATHEROS_E2200, Adapter::AtherosE2200),
        (BROADCOM, BROADCOM_ETHERNET, Adapter::BroadcomEthernet),
        (AQ, AQUANTIA, Adapter::Aquantia),
    ];
    table.iter().find(|(v, devices, _)| matches(id, *v, devices)).map(|&(_, _, adapter)| adapter)
}

impl Adapter {
    /// Returns `true` for Wi-Fi radios.
    #[must_use]
    pub const fn is_wireless(self) -> bool {
        matches!(self, Self::IntelWifi | Self::BroadcomWifi | Self::BroadcomWifiLegacy | Self::AtherosWifi)
    }

    /// Darwin majors the adapter works on without root patching, inclusive.
    #[must_use]
    pub const fn native_window(self) -> (u32, Option<u32>) {
        match self {
            Self::BroadcomWifi => (17, Some(22)),
            Self::BroadcomWifiLegacy | Self::AtherosWifi => (17, Some(17)),
            Self::IntelIgc => (20, None),
            _ => (17, None),
        }
    }

    /// Highest Darwin major reachable with the legacy patcher, when it helps.
    #[must_use]
    pub const fn patcher_max(self) -> Option<u32> {
        match self {
            Self::BroadcomWifi | Self::BroadcomWifiLegacy => Some(u32::MAX),
            Self::AtherosWifi => Some(22),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_parts() {
        assert_eq!(classify(DeviceId::new(0x8086, 0x2723)), Some(Adapter::IntelWifi));
        assert_eq!(classify(DeviceId::new(0x10EC, 0x8168)), Some(Adapter::Realtek8111));
        assert_eq!(classify(DeviceId::new(0x8086, 0x15BC)), Some(Adapter::IntelMausi));
        assert_eq!(classify(DeviceId::new(0x14E4, 0x43A0)), Some(Adapter::BroadcomWifi));
        assert_eq!(classify(DeviceId::new(0x8086, 0x1234)), None);
    }

    #[test]
    fn wireless_split() {
        assert!(Adapter::AtherosWifi.is_wireless());
        assert!(!Adapter::AtherosE2200.is_wireless());
    }
}
