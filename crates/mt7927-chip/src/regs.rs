// SPDX-License-Identifier: AGPL-3.0-only

//! Register map for MT7927 / MT6639 (and the MT7925 subset it shares).
//!
//! Addresses below [`crate::remap::PASSTHROUGH_LIMIT`] are BAR0 offsets and
//! are accessed directly. Everything else is a *logical* chip-bus address and
//! must go through the fixed remap table or the L1/L2 windows
//! (see [`crate::remap`]).
//!
//! ```text
//! 0x0000_0120  HIF_REMAP_L2          L2 window selector (BAR0)
//! 0x0001_0188  PCIE_MAC_INT_ENABLE   PCIe MAC interrupt gate (BAR0)
//! 0x000d_4208  WFDMA0_GLO_CFG        = 0x7c02_4208 via fixed map
//! 0x0013_0000  HIF_REMAP_BASE_L1     64 KB aperture for L1/L2 windows
//! 0x0015_5024  HIF_REMAP_L1          L1 window selector (BAR0)
//! 0x7c06_0204  MCU_STATUS            0 / all-ones after a crash
//! 0x8102_1604  ROMCODE_INDEX         0x1d1e when the boot ROM is idle
//! ```

// ── Bit helpers ──────────────────────────────────────────────────────────────

/// Single bit `n`.
#[must_use]
pub const fn bit(n: u32) -> u32 {
    1 << n
}

/// Contiguous mask covering bits `low..=high`.
#[must_use]
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}

/// Shift `value` into the field described by `mask`.
#[must_use]
pub const fn field_prep(mask: u32, value: u32) -> u32 {
    (value << mask.trailing_zeros()) & mask
}

/// Extract the field described by `mask` from `reg`.
#[must_use]
pub const fn field_get(mask: u32, reg: u32) -> u32 {
    (reg & mask) >> mask.trailing_zeros()
}

// ── HIF address windows (BAR0) ───────────────────────────────────────────────

/// L1 window selector. Upper half holds the window base (`addr >> 16`).
pub const HIF_REMAP_L1: u32 = 0x15_5024;
/// Bits of [`HIF_REMAP_L1`] that select the window.
pub const HIF_REMAP_L1_MASK: u32 = genmask(31, 16);
/// Offset field of a logical address inside an L1 window.
pub const HIF_REMAP_L1_OFFSET: u32 = genmask(15, 0);
/// Base field of a logical address for an L1 window.
pub const HIF_REMAP_L1_BASE: u32 = genmask(31, 16);
/// BAR0 aperture through which L1 and L2 windows are accessed.
pub const HIF_REMAP_BASE_L1: u32 = 0x13_0000;
/// L2 window selector: takes the full logical address.
pub const HIF_REMAP_L2: u32 = 0x0120;
/// Logical base that routes the L1 aperture into the L2 remapper.
pub const HIF_REMAP_BASE_L2: u32 = 0x1850_0000;

// ── WFDMA0 host DMA engine (BAR0) ────────────────────────────────────────────

/// Host interrupt enable (plain read/write).
pub const WFDMA0_HOST_INT_ENA: u32 = 0xd_4204;
/// Global DMA configuration.
pub const WFDMA0_GLO_CFG: u32 = 0xd_4208;
/// Atomic set-register for [`WFDMA0_HOST_INT_ENA`].
pub const WFDMA0_HOST_INT_ENA_SET: u32 = 0xd_4228;
/// Atomic clear-register for [`WFDMA0_HOST_INT_ENA`].
pub const WFDMA0_HOST_INT_ENA_CLR: u32 = 0xd_422c;
/// MCU-to-host software interrupt enable.
pub const MCU2HOST_SW_INT_ENA: u32 = 0xd_41f4;
/// PCIe MAC interrupt gate (0xff enables every source).
pub const PCIE_MAC_INT_ENABLE: u32 = 0x1_0188;

/// [`WFDMA0_GLO_CFG`] bits.
pub mod glo_cfg {
    use super::bit;
    /// TX DMA engine enable.
    pub const TX_DMA_EN: u32 = bit(0);
    /// TX DMA engine busy.
    pub const TX_DMA_BUSY: u32 = bit(1);
    /// RX DMA engine enable.
    pub const RX_DMA_EN: u32 = bit(2);
    /// RX DMA engine busy.
    pub const RX_DMA_BUSY: u32 = bit(3);
    /// Bypass the DMA scheduler so firmware-download frames go straight out.
    pub const FW_DWLD_BYPASS_DMASHDL: u32 = bit(9);
}

/// Host interrupt sources.
pub mod irq {
    use super::{bit, genmask};
    /// All RX-done rings.
    pub const RX_DONE_ALL: u32 = genmask(3, 0);
    /// All TX-done rings.
    pub const TX_DONE_ALL: u32 = genmask(27, 4);
    /// MCU command/event interrupt.
    pub const MCU_CMD: u32 = bit(29);
    /// [`super::MCU2HOST_SW_INT_ENA`]: MCU wake over PCIe.
    pub const MCU_CMD_WAKE_RX_PCIE: u32 = bit(0);
}

// ── Mailbox plumbing (BAR0) ──────────────────────────────────────────────────

/// PCIE2AP remap register (CCIF path into the AP domain).
pub const PCIE2AP_REMAP_WF: u32 = 0x1b_5180;
/// Value routing the CCIF window to the WF mailbox.
pub const PCIE2AP_REMAP_WF_VALUE: u32 = 0x1805_1803;

/// CCIF mailbox block base (logical 0x7c03_0000).
pub const CCIF_BASE: u32 = 0x1a_0000;
/// CCIF acknowledge register offset.
pub const CCIF_ACK: u32 = 0x14;
/// CCIF channel-number acknowledge offset.
pub const CCIF_RCHNUM_ACK: u32 = 0x1c;
/// CCIF IRQ0 mask offset.
pub const CCIF_IRQ0_MASK: u32 = 0x180;
/// CCIF IRQ1 mask offset.
pub const CCIF_IRQ1_MASK: u32 = 0x184;

// ── CONN_INFRA (logical) ─────────────────────────────────────────────────────

/// Low-power control: driver/firmware ownership handshake.
pub const CONN_ON_LPCTL: u32 = 0x7c06_0010;

/// [`CONN_ON_LPCTL`] bits.
pub mod lpctl {
    use super::bit;
    /// Hand ownership to firmware.
    pub const SET_OWN: u32 = bit(0);
    /// Claim ownership for the driver.
    pub const CLR_OWN: u32 = bit(1);
    /// Set while firmware owns the bus.
    pub const OWN_SYNC: u32 = bit(2);
}

/// MCU ready / misc status. Informational after RAM load.
pub const CONN_ON_MISC: u32 = 0x7c06_00f0;
/// Force-wake for the WF side of CONN_INFRA.
pub const CONN_INFRA_WAKEUP_WF: u32 = 0x7c06_01a0;
/// MCU status. Reads 0 or all-ones if the MCU died.
pub const MCU_STATUS: u32 = 0x7c06_0204;
/// WF power state.
pub const CONN_PWR_STATUS: u32 = 0x7c06_0380;
/// [`CONN_PWR_STATUS`]: WF top power-on acknowledge.
pub const PWR_ON_ACK: u32 = bit(24);
/// CONN_INFRA hardware version.
pub const CONN_INFRA_VERSION: u32 = 0x7c01_1000;

/// Cross-domain ownership semaphore (outside the fixed map: L1 window).
pub const CONN_SEMAPHORE: u32 = 0x7c07_0400;
/// [`CONN_SEMAPHORE`]: semaphore 0 held by the MCU.
pub const SEMA00_OWNED_BY_MCU: u32 = bit(0);

/// WF top power control. Writes only land with [`WF_PWR_KEY`] in the same word.
pub const TOP_PWR_CTL: u32 = 0x7c00_0010;
/// Write key for [`TOP_PWR_CTL`].
pub const WF_PWR_KEY: u32 = 0x5746_0000;
/// [`TOP_PWR_CTL`]: power on the WF domain.
pub const WF_PWR_ON: u32 = bit(7);

/// WF CPU reset (active low).
pub const WFSYS_CPU_SW_RST_B: u32 = 0x7c00_0120;
/// [`WFSYS_CPU_SW_RST_B`]: release bit.
pub const WFSYS_CPU_RELEASE: u32 = bit(0);

/// AP-to-WF bus control.
pub const AP2WF_BUS: u32 = 0x7c00_0140;
/// [`AP2WF_BUS`]: WF subsystem finished its own init.
pub const WFSYS_SW_INIT_DONE: u32 = bit(4);

/// Auxiliary clock enables for the WF domain.
pub const CONN_AUX_CLK_EN: u32 = 0x7c00_1004;
/// Bits of [`CONN_AUX_CLK_EN`] owned by WF.
pub const WF_AUX_CLK_MASK: u32 = genmask(1, 0);

/// Sleep-protection enable.
pub const SLP_PROT_EN: u32 = 0x7c00_1620;
/// WF bits in [`SLP_PROT_EN`].
pub const SLP_PROT_WF_MASK: u32 = genmask(2, 0);
/// WF-to-CONN sleep-protect status.
pub const SLP_PROT_WF2CONN_STA: u32 = 0x7c00_1624;
/// CONN-to-WF sleep-protect status.
pub const SLP_PROT_CONN2WF_STA: u32 = 0x7c00_1628;
/// WFDMA-to-CONN sleep-protect status.
pub const SLP_PROT_WFDMA2CONN_STA: u32 = 0x7c00_162c;
/// Busy bit of [`SLP_PROT_WF2CONN_STA`].
pub const SLP_PROT_WF2CONN_BUSY: u32 = bit(0);
/// Busy bit of [`SLP_PROT_CONN2WF_STA`].
pub const SLP_PROT_CONN2WF_BUSY: u32 = bit(4);
/// Busy bits of [`SLP_PROT_WFDMA2CONN_STA`].
pub const SLP_PROT_WFDMA2CONN_BUSY: u32 = genmask(3, 2);

// ── CBTOP / CB_INFRA (logical) ───────────────────────────────────────────────

/// Chip ID.
pub const HW_CHIPID: u32 = 0x7001_0200;
/// Hardware revision.
pub const HW_REV: u32 = 0x7001_0204;

/// GPIO mode 5 mux.
pub const CBTOP_GPIO_MODE5: u32 = 0x7000_535c;
/// GPIO mode 5 value required before subsystem reset.
pub const GPIO_MODE5_VALUE: u32 = 0x8000_0000;
/// GPIO mode 6 mux.
pub const CBTOP_GPIO_MODE6: u32 = 0x7000_536c;
/// GPIO mode 6 value required before subsystem reset.
pub const GPIO_MODE6_VALUE: u32 = 0x80;

/// Crypto-MCU ownership.
pub const CB_INFRA_CRYPTO_MCU_OWN: u32 = 0x7002_5380;

/// CBTOP PCIe remap for the WF window.
pub const CB_INFRA_PCIE_REMAP_WF: u32 = 0x7002_6554;
/// Value for [`CB_INFRA_PCIE_REMAP_WF`].
pub const PCIE_REMAP_WF_VALUE: u32 = 0x7403_7001;
/// CBTOP PCIe remap for the shared WF/BT window.
pub const CB_INFRA_PCIE_REMAP_WF_BT: u32 = 0x7002_6558;
/// Value for [`CB_INFRA_PCIE_REMAP_WF_BT`].
pub const PCIE_REMAP_WF_BT_VALUE: u32 = 0x7000_7000;

/// WF subsystem reset generator.
pub const CB_INFRA_RGU_WF_SUBSYS_RST: u32 = 0x7002_8600;
/// BT subsystem reset generator.
pub const CB_INFRA_RGU_BT_SUBSYS_RST: u32 = 0x7002_8630;
/// Reset-generator pattern: assert.
pub const SUBSYS_RST_ASSERT: u32 = 0x0001_0351;
/// Reset-generator pattern: deassert.
pub const SUBSYS_RST_DEASSERT: u32 = 0x0001_0340;
/// The one bit touched by the fine WF reset.
pub const WF_SUBSYS_RST_BIT: u32 = bit(4);

/// PCIe MAC interrupt routing (through the 0x7403_0000 fixed entry).
pub const PCIE_MAC_INT_CONFIG: u32 = 0x7403_0114;
/// Routing value: every MAC interrupt to the host.
pub const PCIE_MAC_INT_CONFIG_VALUE: u32 = 0x0000_07ff;

// ── WF_TOP_MISC_ON (logical) ─────────────────────────────────────────────────

/// Boot ROM progress index: idle magic, dead pattern or firmware state.
pub const ROMCODE_INDEX: u32 = 0x8102_1604;
