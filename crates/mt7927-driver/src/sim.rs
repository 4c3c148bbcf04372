// SPDX-License-Identifier: AGPL-3.0-only

//! Register-level chip simulator.
//!
//! Stands in for BAR0, the host queues and the clock so the whole bring-up
//! sequence can run without hardware. It models just enough of the chip
//! for the sequencer to make progress:
//!
//! - force-wake returns a valid CONN_INFRA version
//! - a keyed power-on write raises the power-on ack
//! - deasserting WF reset sets `WFSYS_SW_INIT_DONE` and idles the boot ROM
//! - `SET_OWN` / `CLR_OWN` move `OWN_SYNC`
//! - crypto ownership idles the boot ROM
//! - the host-ready nudge moves the ROM-code index off IDLE
//!
//! [`Faults`] switches individual behaviors off or injects a crash.
//!
//! Registers are stored per cell: the BAR0 offset for direct and fixed
//! routes, the logical address for accesses through the L1/L2 aperture.
//! Virtual time only advances on [`Clock::sleep`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use mt7927_chip::regs::{
    self, field_get, glo_cfg, lpctl, HIF_REMAP_BASE_L1, HIF_REMAP_BASE_L2, HIF_REMAP_L1,
    HIF_REMAP_L1_BASE, HIF_REMAP_L2,
};
use mt7927_chip::remap::{route, Route};
use mt7927_chip::variant::VariantConfig;

use crate::clock::Clock;
use crate::device::Device;
use crate::error::{BringupError, Result};
use crate::mmio::RegisterBus;
use crate::queue::{HostQueue, QueueId, TxFrame};

/// `ROMCODE_INDEX` once the simulated firmware runs.
pub const SIM_RUNNING_INDEX: u32 = 0x0000_0003;
/// `MCU_STATUS` of a live simulated MCU.
pub const SIM_ALIVE_STATUS: u32 = 0x0000_0001;
/// CONN_INFRA version reported after force-wake.
pub const SIM_CONNINFRA_VERSION: u32 = 0x0301_0001;

const APERTURE: std::ops::Range<u32> = HIF_REMAP_BASE_L1..HIF_REMAP_BASE_L1 + 0x1_0000;

/// Behaviors to disable and faults to inject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Power-on ack never rises.
    pub no_power_ack: bool,
    /// `WFSYS_SW_INIT_DONE` never sets.
    pub init_done_never: bool,
    /// Ownership semaphore reads as held by the MCU.
    pub semaphore_owned: bool,
    /// MCU dies after this many firmware chunks.
    pub crash_after_chunks: Option<usize>,
    /// The n-th posted frame (0-based, any queue) fails.
    pub fail_post_at: Option<usize>,
    /// Firmware never leaves IDLE after the host-ready nudge.
    pub firmware_stalls: bool,
    /// WFDMA busy bits never clear.
    pub dma_stuck_busy: bool,
    /// Firmware dies instead of starting on the host-ready nudge.
    pub crash_on_start: bool,
    /// Sleep-protect busy bits never clear.
    pub sleep_protect_stuck: bool,
    /// CONN_INFRA reports a version no variant accepts.
    pub bad_conninfra_version: bool,
}

struct SimState {
    variant: &'static VariantConfig,
    faults: Faults,
    regs: HashMap<u32, u32>,
    reads: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    frames: Vec<TxFrame>,
    reclaims: Vec<(QueueId, bool)>,
    posts: usize,
    chunks: usize,
    elapsed: Duration,
    sleeps: u32,
    yields: u32,
}

impl SimState {
    fn new(variant: &'static VariantConfig, faults: Faults) -> Self {
        let mut s = Self {
            variant,
            faults,
            regs: HashMap::new(),
            reads: HashMap::new(),
            writes: Vec::new(),
            frames: Vec::new(),
            reclaims: Vec::new(),
            posts: 0,
            chunks: 0,
            elapsed: Duration::ZERO,
            sleeps: 0,
            yields: 0,
        };
        let version = if faults.bad_conninfra_version { 0 } else { SIM_CONNINFRA_VERSION };
        s.poke(regs::CONN_INFRA_VERSION, version);
        s.poke(regs::MCU_STATUS, SIM_ALIVE_STATUS);
        s.poke(regs::ROMCODE_INDEX, variant.idle_magic);
        s.poke(regs::HW_CHIPID, 0x6639);
        s.poke(regs::HW_REV, 0x8a10);
        if faults.semaphore_owned {
            s.poke(regs::CONN_SEMAPHORE, regs::SEMA00_OWNED_BY_MCU);
        }
        s
    }

    /// Cell of a logical address, resolved the way the register shim routes it.
    fn cell(&self, addr: u32) -> u32 {
        match route(self.variant.remap, addr) {
            Route::Direct(bus) | Route::Fixed(bus) => bus,
            Route::L1 { .. } | Route::L2 { .. } => addr,
        }
    }

    /// Cell behind a BAR0 offset, following the selectors.
    fn resolve(&self, offset: u32) -> u32 {
        if !APERTURE.contains(&offset) {
            return offset;
        }
        let l1 = self.regs.get(&HIF_REMAP_L1).copied().unwrap_or(0);
        let base = field_get(HIF_REMAP_L1_BASE, l1);
        if base == field_get(HIF_REMAP_L1_BASE, HIF_REMAP_BASE_L2) && offset == HIF_REMAP_BASE_L1 {
            return self.regs.get(&HIF_REMAP_L2).copied().unwrap_or(0);
        }
        (base << 16) | (offset - HIF_REMAP_BASE_L1)
    }

    fn get(&self, cell: u32) -> u32 {
        self.regs.get(&cell).copied().unwrap_or(0)
    }

    fn peek(&self, addr: u32) -> u32 {
        self.get(self.cell(addr))
    }

    fn poke(&mut self, addr: u32, value: u32) {
        let cell = self.cell(addr);
        self.regs.insert(cell, value);
    }

    fn is(&self, cell: u32, addr: u32) -> bool {
        cell == self.cell(addr)
    }

    fn read(&mut self, offset: u32) -> u32 {
        let cell = self.resolve(offset);
        *self.reads.entry(cell).or_insert(0) += 1;

        let value = self.get(cell);
        if self.faults.dma_stuck_busy && self.is(cell, regs::WFDMA0_GLO_CFG) {
            return value | glo_cfg::TX_DMA_BUSY;
        }
        if self.faults.sleep_protect_stuck {
            for (sta, busy) in [
                (regs::SLP_PROT_WF2CONN_STA, regs::SLP_PROT_WF2CONN_BUSY),
                (regs::SLP_PROT_CONN2WF_STA, regs::SLP_PROT_CONN2WF_BUSY),
                (regs::SLP_PROT_WFDMA2CONN_STA, regs::SLP_PROT_WFDMA2CONN_BUSY),
            ] {
                if self.is(cell, sta) {
                    return value | busy;
                }
            }
        }
        value
    }

    fn write(&mut self, offset: u32, value: u32) {
        let cell = self.resolve(offset);
        self.writes.push((cell, value));

        if self.is(cell, regs::CONN_ON_LPCTL) {
            let sync = self.get(cell) & lpctl::OWN_SYNC;
            let next = if value & lpctl::SET_OWN != 0 {
                lpctl::OWN_SYNC
            } else if value & lpctl::CLR_OWN != 0 {
                0
            } else {
                sync
            };
            self.regs.insert(cell, next);
            return;
        }

        self.regs.insert(cell, value);

        if self.is(cell, regs::TOP_PWR_CTL) {
            let keyed = value & 0xffff_0000 == regs::WF_PWR_KEY && value & regs::WF_PWR_ON != 0;
            if keyed && !self.faults.no_power_ack {
                let ack = self.peek(regs::CONN_PWR_STATUS) | regs::PWR_ON_ACK;
                self.poke(regs::CONN_PWR_STATUS, ack);
            }
        } else if self.is(cell, regs::CB_INFRA_RGU_WF_SUBSYS_RST) {
            let init = self.peek(regs::AP2WF_BUS);
            if value & regs::WF_SUBSYS_RST_BIT != 0 {
                self.poke(regs::AP2WF_BUS, init & !regs::WFSYS_SW_INIT_DONE);
            } else if !self.faults.init_done_never {
                self.poke(regs::AP2WF_BUS, init | regs::WFSYS_SW_INIT_DONE);
                self.poke(regs::ROMCODE_INDEX, self.variant.idle_magic);
                self.poke(regs::MCU_STATUS, SIM_ALIVE_STATUS);
            }
        } else if self.is(cell, regs::CB_INFRA_CRYPTO_MCU_OWN) {
            if value != 0 && !self.is_crashed() {
                self.poke(regs::ROMCODE_INDEX, self.variant.idle_magic);
            }
        } else if self.is(cell, regs::AP2WF_BUS) {
            let idle = self.peek(regs::ROMCODE_INDEX) == self.variant.idle_magic;
            let nudged = value & regs::WFSYS_SW_INIT_DONE != 0 && self.chunks > 0;
            if idle && nudged {
                if self.faults.crash_on_start {
                    self.crash();
                } else if !self.faults.firmware_stalls {
                    self.poke(regs::ROMCODE_INDEX, SIM_RUNNING_INDEX);
                }
            }
        }
    }

    fn is_crashed(&self) -> bool {
        self.peek(regs::MCU_STATUS) == u32::MAX
    }

    fn crash(&mut self) {
        self.poke(regs::MCU_STATUS, u32::MAX);
        self.poke(regs::ROMCODE_INDEX, self.variant.crashed_magic);
    }

    fn post(&mut self, frame: TxFrame) -> Result<()> {
        let n = self.posts;
        self.posts += 1;
        if self.faults.fail_post_at == Some(n) {
            return Err(BringupError::transfer_failed(format!("ring full at frame {n}")));
        }
        if frame.desc.queue == QueueId::Fwdl {
            self.chunks += 1;
            if self.faults.crash_after_chunks == Some(self.chunks) {
                self.crash();
            }
        }
        self.frames.push(frame);
        Ok(())
    }
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated BAR0.
pub struct SimChip(Shared);

impl RegisterBus for SimChip {
    fn read32(&mut self, offset: u32) -> u32 {
        lock(&self.0).read(offset)
    }

    fn write32(&mut self, offset: u32, value: u32) {
        lock(&self.0).write(offset, value);
    }
}

/// Simulated host queues: records every frame.
pub struct SimQueue(Shared);

impl HostQueue for SimQueue {
    fn post_raw(&mut self, frame: TxFrame) -> Result<()> {
        lock(&self.0).post(frame)
    }

    fn reclaim(&mut self, queue: QueueId, force: bool) {
        lock(&self.0).reclaims.push((queue, force));
    }
}

/// Virtual clock.
pub struct SimClock(Shared);

impl Clock for SimClock {
    fn sleep(&self, duration: Duration) {
        let mut s = lock(&self.0);
        s.elapsed += duration;
        s.sleeps += 1;
    }

    fn yield_now(&self) {
        lock(&self.0).yields += 1;
    }
}

/// Handle onto one simulated chip.
///
/// ```
/// use mt7927_chip::{regs, variant::MT7927};
/// use mt7927_driver::sim::Simulator;
///
/// let sim = Simulator::new(&MT7927);
/// let dev = sim.device();
/// assert_eq!(dev.rr(regs::CONN_INFRA_VERSION), 0x0301_0001);
/// ```
#[derive(Clone)]
pub struct Simulator {
    state: Shared,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = lock(&self.state);
        f.debug_struct("Simulator")
            .field("chip", &s.variant.chip)
            .field("faults", &s.faults)
            .field("frames", &s.frames.len())
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Healthy chip of `variant`.
    pub fn new(variant: &'static VariantConfig) -> Self {
        Self::with_faults(variant, Faults::default())
    }

    /// Chip of `variant` with `faults`.
    pub fn with_faults(variant: &'static VariantConfig, faults: Faults) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(variant, faults))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// A [`Device`] wired to this simulator.
    pub fn device(&self) -> Device {
        let variant = self.lock().variant;
        Device::new(
            Box::new(SimChip(Arc::clone(&self.state))),
            Box::new(SimQueue(Arc::clone(&self.state))),
            variant,
            Arc::new(SimClock(Arc::clone(&self.state))),
        )
    }

    /// Replace the active faults.
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Kill the MCU now.
    pub fn crash(&self) {
        self.lock().crash();
    }

    /// Register value at logical `addr`, without side effects.
    pub fn peek(&self, addr: u32) -> u32 {
        self.lock().peek(addr)
    }

    /// Set the register at logical `addr`, without side effects.
    pub fn poke(&self, addr: u32, value: u32) {
        self.lock().poke(addr, value);
    }

    /// Bus reads of logical `addr` so far.
    pub fn reads(&self, addr: u32) -> u32 {
        let s = self.lock();
        s.reads.get(&s.cell(addr)).copied().unwrap_or(0)
    }

    /// Values written to logical `addr`, in order.
    pub fn writes(&self, addr: u32) -> Vec<u32> {
        let s = self.lock();
        let cell = s.cell(addr);
        s.writes
            .iter()
            .filter(|(c, _)| *c == cell)
            .map(|&(_, v)| v)
            .collect()
    }

    /// Every frame posted, in order.
    pub fn frames(&self) -> Vec<TxFrame> {
        self.lock().frames.clone()
    }

    /// Payloads posted on the FWDL queue.
    pub fn scatter_chunks(&self) -> Vec<Bytes> {
        self.lock()
            .frames
            .iter()
            .filter(|f| f.desc.queue == QueueId::Fwdl)
            .map(|f| f.data.clone())
            .collect()
    }

    /// Reclaim calls, in order.
    pub fn reclaims(&self) -> Vec<(QueueId, bool)> {
        self.lock().reclaims.clone()
    }

    /// Virtual time slept.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of sleeps.
    pub fn sleeps(&self) -> u32 {
        self.lock().sleeps
    }

    /// Number of voluntary yields.
    pub fn yields(&self) -> u32 {
        self.lock().yields
    }
}
