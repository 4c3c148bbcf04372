// SPDX-License-Identifier: AGPL-3.0-only

//! Logical-to-bus address translation tables.
//!
//! The chip bus is 32 bits wide but BAR0 only exposes 2 MB. The host reaches
//! the rest through three mechanisms, tried in order:
//!
//! ```text
//! addr < 0x20_0000         BAR0 offset, used as-is
//! fixed table hit          mapped + (addr - phys)
//! L1 window ranges         HIF_REMAP_L1 = addr >> 16, access BASE_L1 + (addr & 0xffff)
//! anything else            L1 -> L2 base, HIF_REMAP_L2 = addr, access BASE_L1
//! ```
//!
//! Only the pure arithmetic lives here. Programming the selectors is the
//! driver's job because it needs the bus and a lock.

use crate::regs::{field_get, HIF_REMAP_L1_BASE, HIF_REMAP_L1_OFFSET, HIF_REMAP_BASE_L1};

/// Addresses below this are BAR0 offsets.
pub const PASSTHROUGH_LIMIT: u32 = 0x20_0000;

/// Logical ranges reachable through the L1 window (half-open).
pub const L1_WINDOWS: &[(u32, u32)] = &[
    (0x1800_0000, 0x18c0_0000),
    (0x7000_0000, 0x7800_0000),
    (0x7c00_0000, 0x7c40_0000),
];

/// One fixed remap entry: `size` bytes at logical `phys` appear at BAR0 `mapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapEntry {
    /// Logical base.
    pub phys: u32,
    /// BAR0 offset of the base.
    pub mapped: u32,
    /// Window size in bytes.
    pub size: u32,
}

impl RemapEntry {
    const fn new(phys: u32, mapped: u32, size: u32) -> Self {
        Self { phys, mapped, size }
    }

    /// BAR0 offset for `addr` if this entry covers it.
    #[must_use]
    pub const fn translate(&self, addr: u32) -> Option<u32> {
        if addr < self.phys {
            return None;
        }
        let ofs = addr - self.phys;
        if ofs >= self.size {
            return None;
        }
        Some(self.mapped + ofs)
    }
}

/// How a logical address is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// BAR0 offset, no translation.
    Direct(u32),
    /// Fixed table translation.
    Fixed(u32),
    /// L1 window: selector base and aperture offset.
    L1 {
        /// Value for the upper half of `HIF_REMAP_L1`.
        base: u32,
        /// BAR0 offset inside the aperture.
        bus: u32,
    },
    /// L2 window: full logical address goes to `HIF_REMAP_L2`.
    L2 {
        /// Logical address written to the L2 selector.
        addr: u32,
        /// BAR0 offset of the aperture.
        bus: u32,
    },
}

/// Entries shared by every variant, in lookup order.
macro_rules! common_entries {
    () => {
        [
            RemapEntry::new(0x830c_0000, 0x00_0000, 0x1000), // WF_MCU_BUS_CR_REMAP
            RemapEntry::new(0x5400_0000, 0x00_2000, 0x1000), // WFDMA PCIE0 MCU DMA0
            RemapEntry::new(0x5500_0000, 0x00_3000, 0x1000), // WFDMA PCIE0 MCU DMA1
            RemapEntry::new(0x5600_0000, 0x00_4000, 0x1000), // WFDMA reserved
            RemapEntry::new(0x5700_0000, 0x00_5000, 0x1000), // WFDMA MCU wrap CR
            RemapEntry::new(0x5800_0000, 0x00_6000, 0x1000), // WFDMA PCIE1 MCU DMA0
            RemapEntry::new(0x5900_0000, 0x00_7000, 0x1000), // WFDMA PCIE1 MCU DMA1
            RemapEntry::new(0x820c_0000, 0x00_8000, 0x4000), // UMAC PLE
            RemapEntry::new(0x820c_8000, 0x00_c000, 0x2000), // UMAC PSE
            RemapEntry::new(0x820c_c000, 0x00_e000, 0x2000), // UMAC PP
            RemapEntry::new(0x820e_0000, 0x02_0000, 0x0400), // LMAC BN0 CFG
            RemapEntry::new(0x820e_1000, 0x02_0400, 0x0200), // LMAC BN0 TRB
            RemapEntry::new(0x820e_2000, 0x02_0800, 0x0400), // LMAC BN0 AGG
            RemapEntry::new(0x820e_3000, 0x02_0c00, 0x0400), // LMAC BN0 ARB
            RemapEntry::new(0x820e_4000, 0x02_1000, 0x0400), // LMAC BN0 TMAC
            RemapEntry::new(0x820e_5000, 0x02_1400, 0x0800), // LMAC BN0 RMAC
            RemapEntry::new(0x820c_e000, 0x02_1c00, 0x0200), // LMAC SEC
            RemapEntry::new(0x820e_7000, 0x02_1e00, 0x0200), // LMAC BN0 DMA
            RemapEntry::new(0x820c_f000, 0x02_2000, 0x1000), // LMAC PF
            RemapEntry::new(0x820e_9000, 0x02_3400, 0x0200), // LMAC BN0 WTBLOFF
            RemapEntry::new(0x820e_a000, 0x02_4000, 0x0200), // LMAC BN0 ETBF
            RemapEntry::new(0x820e_b000, 0x02_4200, 0x0400), // LMAC BN0 LPON
            RemapEntry::new(0x820e_c000, 0x02_4600, 0x0200), // LMAC BN0 INT
            RemapEntry::new(0x820e_d000, 0x02_4800, 0x0800), // LMAC BN0 MIB
            RemapEntry::new(0x820c_a000, 0x02_6000, 0x2000), // LMAC BN0 MUCOP
            RemapEntry::new(0x820d_0000, 0x03_0000, 0x1_0000), // LMAC WTBLON
            RemapEntry::new(0x4000_0000, 0x07_0000, 0x1_0000), // UMAC SYSRAM
            RemapEntry::new(0x0040_0000, 0x08_0000, 0x1_0000), // MCU SYSRAM
            RemapEntry::new(0x0041_0000, 0x09_0000, 0x1_0000), // MCU SYSRAM config
            RemapEntry::new(0x820f_0000, 0x0a_0000, 0x0400), // LMAC BN1 CFG
            RemapEntry::new(0x820f_1000, 0x0a_0600, 0x0200), // LMAC BN1 TRB
            RemapEntry::new(0x820f_2000, 0x0a_0800, 0x0400), // LMAC BN1 AGG
            RemapEntry::new(0x820f_3000, 0x0a_0c00, 0x0400), // LMAC BN1 ARB
            RemapEntry::new(0x820f_4000, 0x0a_1000, 0x0400), // LMAC BN1 TMAC
            RemapEntry::new(0x820f_5000, 0x0a_1400, 0x0800), // LMAC BN1 RMAC
            RemapEntry::new(0x820f_7000, 0x0a_1e00, 0x0200), // LMAC BN1 DMA
            RemapEntry::new(0x820f_9000, 0x0a_3400, 0x0200), // LMAC BN1 WTBLOFF
            RemapEntry::new(0x820f_a000, 0x0a_4000, 0x0200), // LMAC BN1 ETBF
            RemapEntry::new(0x820f_b000, 0x0a_4200, 0x0400), // LMAC BN1 LPON
            RemapEntry::new(0x820f_c000, 0x0a_4600, 0x0200), // LMAC BN1 INT
            RemapEntry::new(0x820f_d000, 0x0a_4800, 0x0800), // LMAC BN1 MIB
            RemapEntry::new(0x820c_4000, 0x0a_8000, 0x4000), // LMAC BN1 MUCOP
            RemapEntry::new(0x820b_0000, 0x0a_e000, 0x1000), // WFSYS_ON
            RemapEntry::new(0x8002_0000, 0x0b_0000, 0x1_0000), // WF_TOP_MISC_OFF
            RemapEntry::new(0x8102_0000, 0x0c_0000, 0x1_0000), // WF_TOP_MISC_ON
            RemapEntry::new(0x7c02_0000, 0x0d_0000, 0x1_0000), // CONN_INFRA wfdma
            RemapEntry::new(0x7c06_0000, 0x0e_0000, 0x1_0000), // conn_host_csr_top
            RemapEntry::new(0x7c00_0000, 0x0f_0000, 0x1_0000), // CONN_INFRA
            RemapEntry::new(0x7c01_0000, 0x10_0000, 0x1_0000), // CONN_INFRA cfg
            RemapEntry::new(0x7c03_0000, 0x1a_0000, 0x1_0000), // CONN_INFRA_ON_CCIF
        ]
    };
}

const MT7925_ENTRIES: [RemapEntry; 53] = {
    let common = common_entries!();
    let mut out = [RemapEntry::new(0, 0, 0); 53];
    let mut i = 0;
    while i < common.len() {
        out[i] = common[i];
        i += 1;
    }
    out[50] = RemapEntry::new(0x7000_0000, 0x1e_0000, 0x9000); // CBTOP low
    out[51] = RemapEntry::new(0x7002_0000, 0x1f_0000, 0x1_0000); // CBTOP, fixed
    out[52] = RemapEntry::new(0x7c50_0000, 0x06_0000, 0x200_0000); // remap
    out
};

const MT7927_ENTRIES: [RemapEntry; 54] = {
    let common = common_entries!();
    let mut out = [RemapEntry::new(0, 0, 0); 54];
    let mut i = 0;
    while i < common.len() {
        out[i] = common[i];
        i += 1;
    }
    out[50] = RemapEntry::new(0x7403_0000, 0x01_0000, 0x1000); // PCIe MAC
    out[51] = RemapEntry::new(0x7000_0000, 0x1e_0000, 0x9000); // CBTOP low
    out[52] = RemapEntry::new(0x7002_0000, 0x1f_0000, 0x1_0000); // CBTOP, fixed
    out[53] = RemapEntry::new(0x7c50_0000, 0x06_0000, 0x200_0000); // remap
    out
};

/// MT7925 fixed map.
pub const MT7925_MAP: &[RemapEntry] = &MT7925_ENTRIES;

/// MT7927 / MT6639 fixed map: MT7925 plus the PCIe MAC block.
pub const MT7927_MAP: &[RemapEntry] = &MT7927_ENTRIES;

/// First fixed-table hit for `addr`.
#[must_use]
pub fn translate_fixed(table: &[RemapEntry], addr: u32) -> Option<u32> {
    table.iter().find_map(|e| e.translate(addr))
}

/// Whether `addr` falls in one of the L1 window ranges.
#[must_use]
pub fn in_l1_window(addr: u32) -> bool {
    L1_WINDOWS.iter().any(|&(lo, hi)| (lo..hi).contains(&addr))
}

/// Selector base and aperture offset for an L1 access.
#[must_use]
pub const fn l1_window(addr: u32) -> (u32, u32) {
    (
        field_get(HIF_REMAP_L1_BASE, addr),
        HIF_REMAP_BASE_L1 + field_get(HIF_REMAP_L1_OFFSET, addr),
    )
}

/// Decide how `addr` is reached with `table`.
#[must_use]
pub fn route(table: &[RemapEntry], addr: u32) -> Route {
    if addr < PASSTHROUGH_LIMIT {
        return Route::Direct(addr);
    }
    if let Some(bus) = translate_fixed(table, addr) {
        return Route::Fixed(bus);
    }
    if in_l1_window(addr) {
        let (base, bus) = l1_window(addr);
        return Route::L1 { base, bus };
    }
    Route::L2 {
        addr,
        bus: HIF_REMAP_BASE_L1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs;

    #[test]
    fn passthrough_below_limit() {
        assert_eq!(route(MT7927_MAP, 0x1_0188), Route::Direct(0x1_0188));
        assert_eq!(route(MT7927_MAP, 0x1f_ffff), Route::Direct(0x1f_ffff));
    }

    #[test]
    fn fixed_hits() {
        assert_eq!(route(MT7927_MAP, regs::MCU_STATUS), Route::Fixed(0xe_0204));
        assert_eq!(route(MT7927_MAP, regs::ROMCODE_INDEX), Route::Fixed(0xc_1604));
        assert_eq!(
            route(MT7927_MAP, regs::CB_INFRA_RGU_WF_SUBSYS_RST),
            Route::Fixed(0x1f_8600)
        );
        assert_eq!(route(MT7927_MAP, regs::CBTOP_GPIO_MODE5), Route::Fixed(0x1e_535c));
        assert_eq!(route(MT7927_MAP, 0x7c02_4208), Route::Fixed(regs::WFDMA0_GLO_CFG));
    }

    #[test]
    fn pcie_mac_only_on_mt7927() {
        assert_eq!(
            route(MT7927_MAP, regs::PCIE_MAC_INT_CONFIG),
            Route::Fixed(0x1_0114)
        );
        assert!(matches!(
            route(MT7925_MAP, regs::PCIE_MAC_INT_CONFIG),
            Route::L1 { base: 0x7403, .. }
        ));
    }

    #[test]
    fn entry_end_is_exclusive() {
        let e = RemapEntry::new(0x7000_0000, 0x1e_0000, 0x9000);
        assert_eq!(e.translate(0x7000_8fff), Some(0x1e_8fff));
        assert_eq!(e.translate(0x7000_9000), None);
        assert_eq!(e.translate(0x6fff_ffff), None);
    }

    #[test]
    fn l1_for_unmapped_high_windows() {
        assert_eq!(
            route(MT7927_MAP, regs::CONN_SEMAPHORE),
            Route::L1 { base: 0x7c07, bus: 0x13_0400 }
        );
        // Chip ID sits past the 0x9000-byte CBTOP entry.
        assert_eq!(
            route(MT7927_MAP, regs::HW_CHIPID),
            Route::L1 { base: 0x7001, bus: 0x13_0200 }
        );
    }

    #[test]
    fn l2_for_everything_else() {
        assert_eq!(
            route(MT7927_MAP, 0x6000_1234),
            Route::L2 { addr: 0x6000_1234, bus: regs::HIF_REMAP_BASE_L1 }
        );
    }

    #[test]
    fn tables_have_no_empty_entries() {
        assert!(MT7925_MAP.iter().all(|e| e.size > 0));
        assert!(MT7927_MAP.iter().all(|e| e.size > 0));
    }
}
