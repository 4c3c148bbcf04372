// SPDX-License-Identifier: AGPL-3.0-only

//! Device handle and MCU state classification
//!
//! A [`Device`] owns everything bring-up touches: the register shim, the
//! MCU command channel, the interrupt map, the variant policy table and the
//! clock. Orchestrator operations take `&mut Device` so nothing else can
//! touch the chip while a sequence runs.

use std::sync::Arc;
use std::time::Duration;

use mt7927_chip::regs::{self, irq};
use mt7927_chip::variant::{PollSpec, VariantConfig};

use crate::clock::{Clock, SystemClock};
use crate::error::{BringupError, Result};
use crate::mcu::McuChannel;
use crate::mmio::{MmioBus, RegisterBus};
use crate::poll::{poll, PollOutcome};
use crate::queue::HostQueue;
use crate::remap::RegisterShim;

/// Interrupt registers and the bits bring-up enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqMap {
    /// Host interrupt enable register.
    pub host_irq_enable: u32,
    /// Atomic set register, when the variant has one.
    pub host_irq_set: Option<u32>,
    /// Atomic clear register, when the variant has one.
    pub host_irq_clear: Option<u32>,
    /// TX/RX completion and MCU command bits.
    pub host_bits: u32,
    /// MCU-to-host software interrupt enable register.
    pub mcu2host_enable: u32,
    /// Wake bit in `mcu2host_enable`.
    pub mcu2host_wake: u32,
}

impl IrqMap {
    /// Map for `variant`.
    pub fn for_variant(variant: &VariantConfig) -> Self {
        let (set, clear) = if variant.irq_set_clear {
            (
                Some(regs::WFDMA0_HOST_INT_ENA_SET),
                Some(regs::WFDMA0_HOST_INT_ENA_CLR),
            )
        } else {
            (None, None)
        };
        Self {
            host_irq_enable: regs::WFDMA0_HOST_INT_ENA,
            host_irq_set: set,
            host_irq_clear: clear,
            host_bits: irq::RX_DONE_ALL | irq::TX_DONE_ALL | irq::MCU_CMD,
            mcu2host_enable: regs::MCU2HOST_SW_INT_ENA,
            mcu2host_wake: irq::MCU_CMD_WAKE_RX_PCIE,
        }
    }
}

/// MCU state as read from the ROM-code index register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McuState {
    /// Boot ROM waiting for firmware.
    Idle,
    /// Dead pattern.
    Crashed,
    /// 0 or all-ones: the register is not answering.
    Invalid,
    /// Anything else: firmware running or transitioning.
    Running(u32),
}

impl McuState {
    /// Classify a raw ROM-code index value.
    pub fn classify(value: u32, variant: &VariantConfig) -> Self {
        if value == 0 || value == u32::MAX {
            Self::Invalid
        } else if value == variant.crashed_magic {
            Self::Crashed
        } else if value == variant.idle_magic {
            Self::Idle
        } else {
            Self::Running(value)
        }
    }

    /// Whether only a full bring-up can help.
    pub fn needs_reset(self) -> bool {
        matches!(self, Self::Crashed | Self::Invalid)
    }
}

impl std::fmt::Display for McuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Crashed => write!(f, "crashed"),
            Self::Invalid => write!(f, "invalid"),
            Self::Running(v) => write!(f, "running ({v:#010x})"),
        }
    }
}

/// How sure we are that the firmware is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunConfidence {
    /// The ROM-code index left IDLE after the RAM load.
    Confirmed,
    /// Still IDLE when the running poll gave up; marked running anyway.
    Assumed,
}

/// Mutable status flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// Firmware marked running.
    pub mcu_running: bool,
    /// Set together with `mcu_running`.
    pub run_confidence: Option<RunConfidence>,
    /// Between `suspend_prepare` and `resume_restore`.
    pub suspended: bool,
    /// `(HW_CHIPID << 16) | (HW_REV & 0xff)`.
    pub rev: Option<u32>,
    /// Start address override recorded from the RAM image.
    pub override_addr: Option<u32>,
}

/// One attached chip.
pub struct Device {
    shim: RegisterShim,
    mcu: McuChannel,
    irq: IrqMap,
    variant: &'static VariantConfig,
    clock: Arc<dyn Clock>,
    state: DeviceState,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("chip", &self.variant.chip)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Attach to a chip through `bus` and `queue`.
    pub fn new(
        bus: Box<dyn RegisterBus>,
        queue: Box<dyn HostQueue>,
        variant: &'static VariantConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::debug!("attaching {}", variant.chip);
        Self {
            shim: RegisterShim::new(bus, variant.remap),
            mcu: McuChannel::new(queue),
            irq: IrqMap::for_variant(variant),
            variant,
            clock,
            state: DeviceState::default(),
        }
    }

    /// Attach to the PCIe function at `pcie_address` with real time.
    ///
    /// # Errors
    ///
    /// Returns error if BAR0 cannot be mapped.
    pub fn open(
        pcie_address: &str,
        queue: Box<dyn HostQueue>,
        variant: &'static VariantConfig,
    ) -> Result<Self> {
        let bus = MmioBus::open(pcie_address, 0)?;
        Ok(Self::new(Box::new(bus), queue, variant, Arc::new(SystemClock)))
    }

    /// Replace the interrupt map.
    #[must_use]
    pub fn with_irq_map(mut self, irq: IrqMap) -> Self {
        self.irq = irq;
        self
    }

    /// Register shim.
    pub fn shim(&self) -> &RegisterShim {
        &self.shim
    }

    /// MCU command channel.
    pub fn mcu(&self) -> &McuChannel {
        &self.mcu
    }

    /// Interrupt map.
    pub fn irq(&self) -> &IrqMap {
        &self.irq
    }

    /// Variant policy.
    pub fn variant(&self) -> &'static VariantConfig {
        self.variant
    }

    /// Status flags.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// Whether the firmware is marked running.
    pub fn is_running(&self) -> bool {
        self.state.mcu_running
    }

    /// Whether the device is suspended.
    pub fn is_suspended(&self) -> bool {
        self.state.suspended
    }

    /// Read a logical register.
    pub fn rr(&self, addr: u32) -> u32 {
        self.shim.read(addr)
    }

    /// Write a logical register.
    pub fn wr(&self, addr: u32, value: u32) {
        self.shim.write(addr, value);
    }

    /// Read-modify-write a logical register.
    pub fn rmw(&self, addr: u32, mask: u32, value: u32) -> u32 {
        self.shim.rmw(addr, mask, value)
    }

    /// Set bits in a logical register.
    pub fn set(&self, addr: u32, bits: u32) -> u32 {
        self.shim.set(addr, bits)
    }

    /// Clear bits in a logical register.
    pub fn clear(&self, addr: u32, bits: u32) -> u32 {
        self.shim.clear(addr, bits)
    }

    /// Sleep on the device clock.
    pub fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// Yield on the device clock.
    pub fn yield_now(&self) {
        self.clock.yield_now();
    }

    /// Bounded poll of a logical register.
    pub fn poll(&self, addr: u32, predicate: impl Fn(u32) -> bool, spec: PollSpec) -> PollOutcome {
        poll(&self.shim, self.clock.as_ref(), addr, predicate, spec)
    }

    /// Fresh read of the MCU state.
    pub fn mcu_state(&self) -> McuState {
        McuState::classify(self.rr(regs::ROMCODE_INDEX), self.variant)
    }

    /// Read `MCU_STATUS` and fail if the MCU stopped answering.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::McuCrashed`] on 0 or all-ones.
    pub fn check_alive(&self) -> Result<u32> {
        let status = self.rr(regs::MCU_STATUS);
        if status == 0 || status == u32::MAX {
            tracing::error!("MCU_STATUS = {status:#010x}, MCU crashed");
            return Err(BringupError::McuCrashed { status });
        }
        Ok(status)
    }

    /// Read and record the ASIC revision.
    pub fn read_revision(&mut self) -> u32 {
        let rev = (self.rr(regs::HW_CHIPID) << 16) | (self.rr(regs::HW_REV) & 0xff);
        tracing::info!("{}: ASIC revision {rev:#06x}", self.variant.chip);
        self.state.rev = Some(rev);
        rev
    }
}
