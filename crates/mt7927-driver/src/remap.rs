// SPDX-License-Identifier: AGPL-3.0-only

//! Register access shim: logical chip addresses over a BAR0 [`RegisterBus`].
//!
//! Translation follows [`mt7927_chip::remap::route`]. Banked (L1/L2) accesses
//! reprogram shared selector registers, so translate-then-access runs under
//! one mutex and the previous selector values are written back on the next
//! translated access or on [`RegisterShim::restore`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use mt7927_chip::regs::{
    field_get, field_prep, HIF_REMAP_BASE_L2, HIF_REMAP_L1, HIF_REMAP_L1_BASE, HIF_REMAP_L1_MASK,
    HIF_REMAP_L2,
};
use mt7927_chip::remap::{route, RemapEntry, Route};

use crate::mmio::RegisterBus;

struct ShimState {
    bus: Box<dyn RegisterBus>,
    backup_l1: Option<u32>,
    backup_l2: Option<u32>,
}

impl ShimState {
    fn restore(&mut self) {
        if let Some(l1) = self.backup_l1.take() {
            self.bus.write32(HIF_REMAP_L1, l1);
        }
        if let Some(l2) = self.backup_l2.take() {
            self.bus.write32(HIF_REMAP_L2, l2);
        }
    }

    fn select_l1(&mut self, base: u32) {
        let old = self.bus.read32(HIF_REMAP_L1);
        self.backup_l1 = Some(old);
        self.bus.write32(
            HIF_REMAP_L1,
            (old & !HIF_REMAP_L1_MASK) | field_prep(HIF_REMAP_L1_MASK, base),
        );
    }

    fn map(&mut self, table: &[RemapEntry], addr: u32) -> u32 {
        let route = route(table, addr);
        if let Route::Direct(bus) = route {
            return bus;
        }

        self.restore();

        match route {
            Route::Direct(bus) | Route::Fixed(bus) => bus,
            Route::L1 { base, bus } => {
                self.select_l1(base);
                // use read to push write
                self.bus.read32(HIF_REMAP_L1);
                bus
            }
            Route::L2 { addr, bus } => {
                self.select_l1(field_get(HIF_REMAP_L1_BASE, HIF_REMAP_BASE_L2));
                self.backup_l2 = Some(self.bus.read32(HIF_REMAP_L2));
                self.bus.write32(HIF_REMAP_L2, addr);
                self.bus.read32(HIF_REMAP_L1);
                bus
            }
        }
    }
}

/// Logical register access for one device.
pub struct RegisterShim {
    table: &'static [RemapEntry],
    state: Mutex<ShimState>,
}

impl std::fmt::Debug for RegisterShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterShim")
            .field("entries", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl RegisterShim {
    /// Wrap `bus` with the fixed remap `table` of the attached variant.
    pub fn new(bus: Box<dyn RegisterBus>, table: &'static [RemapEntry]) -> Self {
        Self {
            table,
            state: Mutex::new(ShimState {
                bus,
                backup_l1: None,
                backup_l2: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShimState> {
        // Registers have no invariant a panicking holder could break.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the register at logical `addr`.
    pub fn read(&self, addr: u32) -> u32 {
        let mut s = self.lock();
        let bus = s.map(self.table, addr);
        s.bus.read32(bus)
    }

    /// Write `value` to the register at logical `addr`.
    pub fn write(&self, addr: u32, value: u32) {
        let mut s = self.lock();
        let bus = s.map(self.table, addr);
        s.bus.write32(bus, value);
    }

    /// Replace the bits in `mask` with `value`; returns the value written.
    pub fn rmw(&self, addr: u32, mask: u32, value: u32) -> u32 {
        let mut s = self.lock();
        let bus = s.map(self.table, addr);
        let new = (s.bus.read32(bus) & !mask) | value;
        s.bus.write32(bus, new);
        new
    }

    /// Set `bits`; returns the value written.
    pub fn set(&self, addr: u32, bits: u32) -> u32 {
        self.rmw(addr, 0, bits)
    }

    /// Clear `bits`; returns the value written.
    pub fn clear(&self, addr: u32, bits: u32) -> u32 {
        self.rmw(addr, bits, 0)
    }

    /// Write back any selector values saved by a banked access.
    pub fn restore(&self) {
        self.lock().restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt7927_chip::regs::{self, HIF_REMAP_BASE_L1};
    use mt7927_chip::remap::MT7927_MAP;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Rd(u32),
        Wr(u32, u32),
    }

    #[derive(Default)]
    struct Recorder {
        regs: HashMap<u32, u32>,
        ops: Vec<Op>,
    }

    struct RecordingBus(Arc<Mutex<Recorder>>);

    impl RegisterBus for RecordingBus {
        fn read32(&mut self, offset: u32) -> u32 {
            let mut r = self.0.lock().unwrap();
            r.ops.push(Op::Rd(offset));
            r.regs.get(&offset).copied().unwrap_or(0)
        }

        fn write32(&mut self, offset: u32, value: u32) {
            let mut r = self.0.lock().unwrap();
            r.ops.push(Op::Wr(offset, value));
            r.regs.insert(offset, value);
        }
    }

    fn shim() -> (RegisterShim, Arc<Mutex<Recorder>>) {
        let rec = Arc::new(Mutex::new(Recorder::default()));
        rec.lock().unwrap().regs.insert(HIF_REMAP_L1, 0x1234_0042);
        let shim = RegisterShim::new(Box::new(RecordingBus(Arc::clone(&rec))), MT7927_MAP);
        (shim, rec)
    }

    fn take_ops(rec: &Arc<Mutex<Recorder>>) -> Vec<Op> {
        std::mem::take(&mut rec.lock().unwrap().ops)
    }

    #[test]
    fn direct_access_touches_nothing_else() {
        let (shim, rec) = shim();
        shim.write(regs::PCIE_MAC_INT_ENABLE, 0xff);
        assert_eq!(take_ops(&rec), vec![Op::Wr(regs::PCIE_MAC_INT_ENABLE, 0xff)]);
    }

    #[test]
    fn fixed_access_translates() {
        let (shim, rec) = shim();
        rec.lock().unwrap().regs.insert(0xe_0204, 0xabcd);
        assert_eq!(shim.read(regs::MCU_STATUS), 0xabcd);
        assert_eq!(take_ops(&rec), vec![Op::Rd(0xe_0204)]);
    }

    #[test]
    fn l1_window_programs_and_restores_selector() {
        let (shim, rec) = shim();
        shim.write(regs::CONN_SEMAPHORE, 7);
        assert_eq!(
            take_ops(&rec),
            vec![
                Op::Rd(HIF_REMAP_L1),
                Op::Wr(HIF_REMAP_L1, 0x7c07_0042),
                Op::Rd(HIF_REMAP_L1),
                Op::Wr(HIF_REMAP_BASE_L1 + 0x400, 7),
            ]
        );

        // Next translated access puts the old selector back first.
        shim.read(regs::MCU_STATUS);
        assert_eq!(
            take_ops(&rec),
            vec![Op::Wr(HIF_REMAP_L1, 0x1234_0042), Op::Rd(0xe_0204)]
        );

        // Nothing left to restore.
        shim.restore();
        assert!(take_ops(&rec).is_empty());
    }

    #[test]
    fn l2_window_writes_full_address() {
        let (shim, rec) = shim();
        rec.lock().unwrap().regs.insert(HIF_REMAP_L2, 0x55);
        shim.read(0x6000_1234);
        assert_eq!(
            take_ops(&rec),
            vec![
                Op::Rd(HIF_REMAP_L1),
                Op::Wr(HIF_REMAP_L1, 0x1850_0042),
                Op::Rd(HIF_REMAP_L2),
                Op::Wr(HIF_REMAP_L2, 0x6000_1234),
                Op::Rd(HIF_REMAP_L1),
                Op::Rd(HIF_REMAP_BASE_L1),
            ]
        );

        shim.restore();
        assert_eq!(
            take_ops(&rec),
            vec![Op::Wr(HIF_REMAP_L1, 0x1234_0042), Op::Wr(HIF_REMAP_L2, 0x55)]
        );
    }

    #[test]
    fn rmw_preserves_other_bits() {
        let (shim, rec) = shim();
        rec.lock().unwrap().regs.insert(0x1f_8600, 0x0001_0340);
        let v = shim.rmw(regs::CB_INFRA_RGU_WF_SUBSYS_RST, regs::WF_SUBSYS_RST_BIT, regs::WF_SUBSYS_RST_BIT);
        assert_eq!(v, 0x0001_0350);
        assert_eq!(shim.clear(regs::CB_INFRA_RGU_WF_SUBSYS_RST, regs::WF_SUBSYS_RST_BIT), 0x0001_0340);
        assert_eq!(shim.set(regs::CB_INFRA_RGU_WF_SUBSYS_RST, 1), 0x0001_0341);
    }
}
