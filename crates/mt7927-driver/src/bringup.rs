// SPDX-License-Identifier: AGPL-3.0-only

//! Bring-up orchestration
//!
//! Sequences power, firmware download and host setup for one device.
//!
//! # Full bring-up
//!
//! ```text
//! 0  CBTOP PCIe remap, ASIC revision
//! 1  power sequence (Full), fw_own, drv_own           fatal: init done, drv_own
//! 2  crypto MCU ownership, wait for IDLE              fatal: IDLE timeout
//! 3  DMA off, PCIE2AP remap, CCIF, PCIe MAC routing
//! 4  patch sections, PATCH_FINISH, settle, alive      fatal: parse, post, crash
//! 5  RAM regions with queue drain, host-ready nudge   fatal: parse, post, crash
//! 6  DMA on, host / PCIe MAC / wake interrupts
//! 7  wait for IDLE to change                          soft
//! 8  mark running, Confirmed or Assumed
//! ```
//!
//! Any fatal error drops the force-wake request and leaves the device
//! marked not running; callers retry with [`Bringup::recover`].

use mt7927_chip::regs::{self, glo_cfg};

use crate::config::BringupConfig;
use crate::device::{Device, McuState, RunConfidence};
use crate::error::{BringupError, Result};
use crate::firmware::{FirmwareSource, PatchImage, RamImage};
use crate::outcome::{Caveat, Outcome};
use crate::power::{drv_own, fw_own, PowerReport, PowerSequencer, ResetStrategy};
use crate::queue::QueueId;
use crate::transfer::{patch_finish, send_section, SectionReport};

/// Which path an operation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupPath {
    /// Power, reset and firmware load.
    Full,
    /// Re-arm, then firmware load without reset.
    Reload,
    /// Re-arm and host setup only; firmware was already running.
    Rearm,
    /// Resume from suspend with the firmware still alive.
    Resume,
}

/// What a bring-up operation did.
#[derive(Debug, Clone)]
pub struct BringupReport {
    /// Path taken.
    pub path: BringupPath,
    /// Power sequence result, if one ran.
    pub power: Option<PowerReport>,
    /// Patch sections sent.
    pub patch: Vec<SectionReport>,
    /// RAM regions sent.
    pub ram: Vec<SectionReport>,
    /// Run confidence when the device was marked running.
    pub confidence: Option<RunConfidence>,
    /// Caveats from every step.
    pub outcome: Outcome,
}

impl BringupReport {
    fn new(path: BringupPath) -> Self {
        Self {
            path,
            power: None,
            patch: Vec::new(),
            ram: Vec::new(),
            confidence: None,
            outcome: Outcome::ok(),
        }
    }
}

/// Bring-up orchestrator.
pub struct Bringup {
    config: BringupConfig,
    firmware: Box<dyn FirmwareSource>,
}

impl std::fmt::Debug for Bringup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bringup")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Bringup {
    /// Orchestrator loading firmware named by `config` from `firmware`.
    pub fn new(config: BringupConfig, firmware: Box<dyn FirmwareSource>) -> Self {
        Self { config, firmware }
    }

    /// Orchestrator reading firmware from `config.firmware_dir`.
    pub fn from_config(config: BringupConfig) -> Self {
        let source = config.directory_source();
        Self::new(config, Box::new(source))
    }

    /// Configuration in use.
    pub fn config(&self) -> &BringupConfig {
        &self.config
    }

    /// Full attach-time sequence.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: init-done, ownership or IDLE timeout,
    /// bad firmware, post failure, or an MCU crash during transfer or at
    /// firmware start.
    pub fn bring_up(&self, dev: &mut Device) -> Result<BringupReport> {
        tracing::info!("{}: bring-up", dev.variant().chip);
        let mut report = BringupReport::new(BringupPath::Full);
        self.full_sequence(dev, &mut report)
            .inspect_err(|e| abort(dev, e))?;
        Ok(report)
    }

    /// Post-crash path: full bring-up only when the MCU state calls for it.
    ///
    /// # Errors
    ///
    /// Same as [`Bringup::bring_up`].
    pub fn recover(&self, dev: &mut Device) -> Result<BringupReport> {
        let state = dev.mcu_state();
        let known_running = dev.is_running();
        tracing::info!("{}: recover, MCU {state}, marked running {known_running}", dev.variant().chip);

        let path = match state {
            s if s.needs_reset() => BringupPath::Full,
            McuState::Running(_) if !known_running => BringupPath::Full,
            McuState::Running(_) => BringupPath::Rearm,
            _ => BringupPath::Reload,
        };
        if path == BringupPath::Full {
            return self.bring_up(dev);
        }

        let mut report = BringupReport::new(path);
        self.rearm_sequence(dev, &mut report)
            .inspect_err(|e| abort(dev, e))?;
        Ok(report)
    }

    /// Quiesce DMA and interrupts and hand the chip to firmware.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::InvalidState`] if already suspended, or a
    /// timeout if driver ownership cannot be taken.
    pub fn suspend_prepare(&self, dev: &mut Device) -> Result<Outcome> {
        if dev.is_suspended() {
            return Err(BringupError::invalid_state("already suspended"));
        }
        tracing::info!("{}: suspend", dev.variant().chip);
        let mut outcome = Outcome::ok();

        drv_own(dev)?;

        let spec = dev.variant().timing.dma_idle;
        let busy = glo_cfg::TX_DMA_BUSY | glo_cfg::RX_DMA_BUSY;
        if let Some(c) = dev
            .poll(regs::WFDMA0_GLO_CFG, |v| v & busy == 0, spec)
            .caveat("WFDMA idle", regs::WFDMA0_GLO_CFG)
        {
            outcome.degrade(c);
        }
        dev.clear(regs::WFDMA0_GLO_CFG, glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN);

        let irq = *dev.irq();
        dev.wr(irq.host_irq_enable, 0);
        dev.wr(regs::PCIE_MAC_INT_ENABLE, 0);

        if let Some(c) = fw_own(dev) {
            outcome.degrade(c);
        }
        dev.state_mut().suspended = true;
        Ok(outcome)
    }

    /// Undo [`Bringup::suspend_prepare`]; falls back to [`Bringup::recover`]
    /// if the firmware did not survive.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::InvalidState`] if not suspended, or whatever
    /// the recovery path returns.
    pub fn resume_restore(&self, dev: &mut Device) -> Result<BringupReport> {
        if !dev.is_suspended() {
            return Err(BringupError::invalid_state("not suspended"));
        }
        tracing::info!("{}: resume", dev.variant().chip);

        drv_own(dev)?;
        configure_pcie_mac(dev);
        enable_host(dev);
        dev.state_mut().suspended = false;

        let state = dev.mcu_state();
        if state.needs_reset() {
            tracing::warn!("MCU {state} after resume, recovering");
            let st = dev.state_mut();
            st.mcu_running = false;
            st.run_confidence = None;
            return self.recover(dev);
        }

        let mut report = BringupReport::new(BringupPath::Resume);
        report.confidence = dev.state().run_confidence;
        Ok(report)
    }

    fn full_sequence(&self, dev: &mut Device, report: &mut BringupReport) -> Result<()> {
        mark_stopped(dev);
        let v = dev.variant();

        // 0
        if v.needs_cbtop_remap {
            dev.wr(regs::CB_INFRA_PCIE_REMAP_WF, regs::PCIE_REMAP_WF_VALUE);
            dev.wr(regs::CB_INFRA_PCIE_REMAP_WF_BT, regs::PCIE_REMAP_WF_BT_VALUE);
            tracing::debug!(
                "CBTOP remap WF {:#010x} WF_BT {:#010x}",
                dev.rr(regs::CB_INFRA_PCIE_REMAP_WF),
                dev.rr(regs::CB_INFRA_PCIE_REMAP_WF_BT)
            );
        }
        dev.read_revision();

        // 1
        let power = PowerSequencer::new(dev).run(ResetStrategy::Full)?;
        report.outcome.absorb(power.outcome.clone());
        report.power = Some(power);
        if let Some(c) = fw_own(dev) {
            report.outcome.degrade(c);
        }
        drv_own(dev)?;

        self.load_firmware(dev, report)
    }

    fn rearm_sequence(&self, dev: &mut Device, report: &mut BringupReport) -> Result<()> {
        let power = PowerSequencer::new(dev).run(ResetStrategy::Rearm)?;
        report.outcome.absorb(power.outcome.clone());
        report.power = Some(power);
        drv_own(dev)?;

        if report.path == BringupPath::Reload {
            mark_stopped(dev);
            return self.load_firmware(dev, report);
        }

        // Firmware already up: host side only.
        enable_host(dev);
        mark_running(dev, report, RunConfidence::Confirmed);
        Ok(())
    }

    /// Steps 2 to 8.
    fn load_firmware(&self, dev: &mut Device, report: &mut BringupReport) -> Result<()> {
        let v = dev.variant();

        // 2
        if v.needs_cbtop_remap {
            dev.wr(regs::CB_INFRA_CRYPTO_MCU_OWN, 1);
            dev.sleep(v.delays.wake_settle);
        }
        let idle = dev
            .poll(regs::ROMCODE_INDEX, |val| val == v.idle_magic, v.timing.mcu_idle)
            .or_fatal("MCU idle", regs::ROMCODE_INDEX, v.timing.mcu_idle)?;
        tracing::info!("MCU idle ({idle:#010x})");

        // 3
        dev.clear(regs::WFDMA0_GLO_CFG, glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN);
        if v.needs_ccif {
            dev.wr(regs::PCIE2AP_REMAP_WF, regs::PCIE2AP_REMAP_WF_VALUE);
            dev.wr(regs::CCIF_BASE + regs::CCIF_ACK, u32::MAX);
            dev.wr(regs::CCIF_BASE + regs::CCIF_RCHNUM_ACK, u32::MAX);
            dev.wr(regs::CCIF_BASE + regs::CCIF_IRQ0_MASK, u32::MAX);
            dev.wr(regs::CCIF_BASE + regs::CCIF_IRQ1_MASK, u32::MAX);
        }
        configure_pcie_mac(dev);

        // 4
        self.load_patch(dev, report)?;

        // 5
        self.load_ram(dev, report)?;

        // 6
        enable_host(dev);

        // 7
        let out = dev.poll(regs::ROMCODE_INDEX, |val| val != v.idle_magic, v.timing.mcu_running);
        let last = out.value();
        let confidence = match McuState::classify(last, v) {
            McuState::Running(val) if out.reached() => {
                tracing::info!("firmware running ({val:#010x})");
                RunConfidence::Confirmed
            }
            McuState::Crashed | McuState::Invalid => {
                tracing::error!("firmware died on start, ROMCODE_INDEX = {last:#010x}");
                return Err(BringupError::McuCrashed { status: last });
            }
            _ => {
                report.outcome.degrade(Caveat::FirmwareNotStarted { last });
                RunConfidence::Assumed
            }
        };

        // 8
        mark_running(dev, report, confidence);
        Ok(())
    }

    fn load_patch(&self, dev: &mut Device, report: &mut BringupReport) -> Result<()> {
        let data = self.firmware.load(&self.config.patch_name)?;
        let patch = PatchImage::parse(data)?;
        let hdr = patch.header();
        tracing::info!(
            "patch {}: platform {} hw/sw {:#010x} built {}, {} sections",
            self.config.patch_name,
            hdr.platform,
            hdr.hw_sw_ver,
            hdr.build_date,
            hdr.n_region
        );

        for sec in patch.downloadable() {
            let r = send_section(dev, &sec.payload, sec.addr, sec.len, sec.encryption.dl_mode(), true)?;
            report.patch.push(r);
        }

        if let Err(e) = patch_finish(dev) {
            report.outcome.degrade(Caveat::CommandDropped {
                what: "PATCH_FINISH",
                reason: e.to_string(),
            });
        }
        dev.sleep(dev.variant().delays.patch_finish_settle);
        let status = dev.check_alive()?;
        tracing::info!("patch applied, MCU_STATUS {status:#010x}");
        Ok(())
    }

    fn load_ram(&self, dev: &mut Device, report: &mut BringupReport) -> Result<()> {
        let v = dev.variant();
        let data = self.firmware.load(&self.config.ram_name)?;
        let ram = RamImage::parse(data)?;
        let t = ram.trailer();
        tracing::info!(
            "ram {}: chip {:#04x} eco {:#04x} ver {} built {}, {} regions",
            self.config.ram_name,
            t.chip_id,
            t.eco_code,
            t.fw_ver,
            t.build_date,
            t.n_region
        );

        for region in ram.regions() {
            if !region.is_downloadable() {
                tracing::debug!("ram region {}: not downloaded", region.index);
                continue;
            }
            if region.overrides_addr() {
                dev.state_mut().override_addr = Some(region.addr);
            }

            let r = send_section(dev, &region.payload, region.addr, region.len, region.dl_mode(), false)?;
            report.ram.push(r);

            for _ in 0..v.region_drain_rounds {
                dev.mcu().reclaim(QueueId::Fwdl, false);
                dev.sleep(v.delays.region_drain_interval);
            }
            tracing::debug!(
                "ram region {}: MCU_STATUS {:#010x}",
                region.index,
                dev.rr(regs::MCU_STATUS)
            );
        }

        // No FW_START: the ROM mailbox does not take it. Signal host ready instead.
        dev.set(regs::AP2WF_BUS, regs::WFSYS_SW_INIT_DONE);
        tracing::info!("host ready set, CONN_ON_MISC {:#010x}", dev.rr(regs::CONN_ON_MISC));
        dev.mcu().reclaim(QueueId::Fwdl, false);
        Ok(())
    }
}

fn configure_pcie_mac(dev: &Device) {
    if dev.variant().needs_cbtop_remap {
        dev.wr(regs::PCIE_MAC_INT_CONFIG, regs::PCIE_MAC_INT_CONFIG_VALUE);
    }
}

/// Step 6: DMA and interrupts back on.
fn enable_host(dev: &Device) {
    dev.set(regs::WFDMA0_GLO_CFG, glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN);

    let irq = *dev.irq();
    match irq.host_irq_set {
        Some(set) => dev.wr(set, irq.host_bits),
        None => {
            dev.set(irq.host_irq_enable, irq.host_bits);
        }
    }
    dev.wr(regs::PCIE_MAC_INT_ENABLE, 0xff);
    dev.set(irq.mcu2host_enable, irq.mcu2host_wake);
}

fn mark_stopped(dev: &mut Device) {
    let st = dev.state_mut();
    st.mcu_running = false;
    st.run_confidence = None;
}

fn mark_running(dev: &mut Device, report: &mut BringupReport, confidence: RunConfidence) {
    let st = dev.state_mut();
    st.mcu_running = true;
    st.run_confidence = Some(confidence);
    report.confidence = Some(confidence);
    tracing::info!("MCU marked running ({confidence:?})");
}

fn abort(dev: &mut Device, err: &BringupError) {
    tracing::error!("{}: bring-up failed: {err}", dev.variant().chip);
    dev.wr(regs::CONN_INFRA_WAKEUP_WF, 0);
    mark_stopped(dev);
}
