// SPDX-License-Identifier: AGPL-3.0-only

//! Per-variant bring-up policy.
//!
//! Every magic value, poll bound and settle delay the bring-up sequence uses
//! lives in a [`VariantConfig`]. A new chip is added by adding a table here,
//! not by branching in the sequencer.

use std::time::Duration;

use crate::pcie::ChipVariant;
use crate::remap::{RemapEntry, MT7925_MAP, MT7927_MAP};

/// Bounded poll: at most `max_iterations` reads, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    /// Sleep between reads.
    pub interval: Duration,
    /// Upper bound on reads.
    pub max_iterations: u32,
}

impl PollSpec {
    /// `max_iterations` reads, `interval` apart.
    #[must_use]
    pub const fn new(max_iterations: u32, interval: Duration) -> Self {
        Self {
            interval,
            max_iterations,
        }
    }

    /// Worst-case time spent sleeping.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_iterations.saturating_sub(1))
    }
}

/// Poll policies, one per wait purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// CONN_INFRA version after force-wake.
    pub wake: PollSpec,
    /// WF power-on acknowledge.
    pub power_on: PollSpec,
    /// Each sleep-protect status register.
    pub sleep_protect: PollSpec,
    /// `WFSYS_SW_INIT_DONE`.
    pub init_done: PollSpec,
    /// Boot ROM idle magic.
    pub mcu_idle: PollSpec,
    /// Firmware leaving the idle state after RAM load.
    pub mcu_running: PollSpec,
    /// WFDMA busy bits clearing before suspend.
    pub dma_idle: PollSpec,
    /// Driver/firmware ownership handshake.
    pub ownership: PollSpec,
}

/// Fixed settle delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    /// After asserting force-wake.
    pub wake_settle: Duration,
    /// After switching the shared pins to GPIO mode.
    pub gpio_settle: Duration,
    /// Subsystem reset held asserted.
    pub reset_hold: Duration,
    /// After deasserting subsystem reset.
    pub reset_release: Duration,
    /// Fine WF reset held asserted.
    pub fine_reset_hold: Duration,
    /// After deasserting the fine WF reset.
    pub fine_reset_release: Duration,
    /// After each configure request.
    pub config_settle: Duration,
    /// After `PATCH_FINISH_REQ`.
    pub patch_finish_settle: Duration,
    /// Between drain rounds after each RAM region.
    pub region_drain_interval: Duration,
}

/// Everything that differs between chip variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantConfig {
    /// Chip this table describes.
    pub chip: ChipVariant,
    /// Fixed remap table.
    pub remap: &'static [RemapEntry],
    /// CONN_INFRA versions accepted after force-wake.
    pub conninfra_versions: &'static [u32],
    /// `ROMCODE_INDEX` value of an idle boot ROM.
    pub idle_magic: u32,
    /// `ROMCODE_INDEX` value of a crashed MCU.
    pub crashed_magic: u32,
    /// Program the CBTOP PCIe remap before touching 0x7xxx_xxxx registers.
    pub needs_cbtop_remap: bool,
    /// Walk the explicit WF power-on sequence.
    pub needs_power_on: bool,
    /// Follow the coarse reset with a bit-4-only WF reset.
    pub needs_fine_wf_reset: bool,
    /// Arm the CCIF mailbox before firmware download.
    pub needs_ccif: bool,
    /// Host interrupt enable has atomic set/clear registers.
    pub irq_set_clear: bool,
    /// Patch file, relative to the firmware root.
    pub patch_name: &'static str,
    /// RAM file, relative to the firmware root.
    pub ram_name: &'static str,
    /// Scatter chunk size in bytes.
    pub chunk_size: usize,
    /// Chunks between voluntary yields.
    pub yield_every: usize,
    /// Non-forced reclaim rounds after each RAM region.
    pub region_drain_rounds: u32,
    /// Poll policies.
    pub timing: Timing,
    /// Settle delays.
    pub delays: Delays,
}

const fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

const fn us(n: u64) -> Duration {
    Duration::from_micros(n)
}

const COMMON_DELAYS: Delays = Delays {
    wake_settle: ms(1),
    gpio_settle: us(100),
    reset_hold: ms(10),
    reset_release: ms(50),
    fine_reset_hold: ms(1),
    fine_reset_release: ms(10),
    config_settle: ms(5),
    patch_finish_settle: ms(50),
    region_drain_interval: ms(10),
};

/// MT7927 / MT6639.
pub static MT7927: VariantConfig = VariantConfig {
    chip: ChipVariant::Mt7927,
    remap: MT7927_MAP,
    conninfra_versions: &[0x0301_0001, 0x0301_0002],
    idle_magic: 0x1d1e,
    crashed_magic: 0xdead_dead,
    needs_cbtop_remap: true,
    needs_power_on: true,
    needs_fine_wf_reset: true,
    needs_ccif: true,
    irq_set_clear: true,
    patch_name: "mediatek/mt7927/WIFI_MT6639_PATCH_MCU_2_1_hdr.bin",
    ram_name: "mediatek/mt7927/WIFI_RAM_CODE_MT6639_2_1.bin",
    chunk_size: 2048,
    yield_every: 4,
    region_drain_rounds: 10,
    timing: Timing {
        wake: PollSpec::new(10, ms(1)),
        power_on: PollSpec::new(50, us(500)),
        sleep_protect: PollSpec::new(120, us(500)),
        init_done: PollSpec::new(500, ms(1)),
        mcu_idle: PollSpec::new(1000, ms(1)),
        mcu_running: PollSpec::new(100, ms(100)),
        dma_idle: PollSpec::new(1000, ms(1)),
        ownership: PollSpec::new(50, ms(1)),
    },
    delays: COMMON_DELAYS,
};

/// MT7925. Shares the protocol; skips the MT7927-only power and remap steps.
pub static MT7925: VariantConfig = VariantConfig {
    chip: ChipVariant::Mt7925,
    remap: MT7925_MAP,
    conninfra_versions: &[0x0301_0001, 0x0301_0002],
    idle_magic: 0x1d1e,
    crashed_magic: 0xdead_dead,
    needs_cbtop_remap: false,
    needs_power_on: false,
    needs_fine_wf_reset: false,
    needs_ccif: false,
    irq_set_clear: false,
    patch_name: "mediatek/mt7925/WIFI_MT7925_PATCH_MCU_1_1_hdr.bin",
    ram_name: "mediatek/mt7925/WIFI_RAM_CODE_MT7925_1_1.bin",
    chunk_size: 2048,
    yield_every: 4,
    region_drain_rounds: 10,
    timing: Timing {
        wake: PollSpec::new(10, ms(1)),
        power_on: PollSpec::new(20, ms(1)),
        sleep_protect: PollSpec::new(120, ms(1)),
        init_done: PollSpec::new(500, ms(1)),
        mcu_idle: PollSpec::new(1000, ms(1)),
        mcu_running: PollSpec::new(100, ms(100)),
        dma_idle: PollSpec::new(1000, ms(1)),
        ownership: PollSpec::new(50, ms(1)),
    },
    delays: COMMON_DELAYS,
};

impl VariantConfig {
    /// Table for a chip, if one exists.
    #[must_use]
    pub fn for_chip(chip: ChipVariant) -> Option<&'static Self> {
        match chip {
            ChipVariant::Mt7927 => Some(&MT7927),
            ChipVariant::Mt7925 => Some(&MT7925),
            ChipVariant::Unknown(_) => None,
        }
    }

    /// Table for a PCI device ID, if one exists.
    #[must_use]
    pub fn for_device_id(id: u16) -> Option<&'static Self> {
        Self::for_chip(ChipVariant::from_device_id(id))
    }

    /// Whether `version` is an accepted CONN_INFRA version.
    #[must_use]
    pub fn accepts_version(&self, version: u32) -> bool {
        self.conninfra_versions.contains(&version)
    }
}
