// SPDX-License-Identifier: AGPL-3.0-only

//! PCIe identifiers.

/// MediaTek vendor ID (PCI-SIG assigned).
pub const MEDIATEK_VENDOR_ID: u16 = 0x14C3;

/// Device IDs handled by this workspace.
pub mod device_id {
    /// MT7925 (`lspci: 14c3:7925`).
    pub const MT7925: u16 = 0x7925;
    /// MT7925 alternate ID found on some OEM boards.
    pub const MT7925_ALT: u16 = 0x0717;
    /// MT7927 / MT6639 WiFi 7 (`lspci: 14c3:7927`).
    pub const MT7927: u16 = 0x7927;
}

/// All known device IDs.
pub const ALL_DEVICE_IDS: &[u16] = &[device_id::MT7925, device_id::MT7925_ALT, device_id::MT7927];

/// Format a `vendor:device` string for use with `lspci -d`.
#[must_use]
pub fn lspci_filter() -> String {
    format!("{:04x}:{:04x}", MEDIATEK_VENDOR_ID, device_id::MT7927)
}

/// Chip variant identified from the PCI device ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipVariant {
    /// MT7925: WiFi 7, boot ROM with full mailbox.
    Mt7925,
    /// MT7927 / MT6639: WiFi 7, fire-and-forget boot ROM.
    Mt7927,
    /// Unknown / future variant.
    Unknown(u16),
}

impl ChipVariant {
    /// Identify variant from PCI device ID.
    #[must_use]
    pub const fn from_device_id(id: u16) -> Self {
        match id {
            device_id::MT7925 | device_id::MT7925_ALT => Self::Mt7925,
            device_id::MT7927 => Self::Mt7927,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mt7925 => "MT7925",
            Self::Mt7927 => "MT7927",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "unknown ({id:#06x})"),
            known => f.write_str(known.name()),
        }
    }
}
