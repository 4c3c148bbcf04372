// SPDX-License-Identifier: AGPL-3.0-only

//! Power and reset sequencing
//!
//! Takes the WiFi subsystem from asleep to "init done". Almost every check
//! along the way is a heuristic that some parts never acknowledge, so a
//! timeout is recorded as a [`Caveat`] and the walk continues. The single
//! hard failure is the final `WFSYS_SW_INIT_DONE` poll.
//!
//! # States
//!
//! ```text
//! Asleep -> InfraAwake -> DomainPoweredOn -> CpuHeldInReset -> SubsystemReset
//!        -> ResetReleased -> OwnershipClaimed -> InitDone
//! ```
//!
//! [`ResetStrategy::Rearm`] stops at `OwnershipClaimed` without touching
//! the reset lines.

use std::fmt;

use mt7927_chip::regs::{self, lpctl};

use crate::device::Device;
use crate::error::Result;
use crate::outcome::{Caveat, Outcome};

/// Where the power sequence got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PowerState {
    /// Nothing done yet.
    Asleep,
    /// Connectivity infrastructure forced awake.
    InfraAwake,
    /// WF power domain switched on.
    DomainPoweredOn,
    /// WF CPU held in reset with bus protection lifted.
    CpuHeldInReset,
    /// BT and WF subsystems reset.
    SubsystemReset,
    /// Force-wake released, sleep protection back on.
    ResetReleased,
    /// Ownership semaphore checked.
    OwnershipClaimed,
    /// `WFSYS_SW_INIT_DONE` observed.
    InitDone,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Asleep => "asleep",
            Self::InfraAwake => "infra awake",
            Self::DomainPoweredOn => "domain powered on",
            Self::CpuHeldInReset => "CPU held in reset",
            Self::SubsystemReset => "subsystem reset",
            Self::ResetReleased => "reset released",
            Self::OwnershipClaimed => "ownership claimed",
            Self::InitDone => "init done",
        };
        f.write_str(name)
    }
}

/// Which reset path to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStrategy {
    /// Power on, reset both subsystems, wait for init done.
    Full,
    /// Wake, clocks and ownership only. For a chip that is known healthy.
    ///
    /// Unlike [`ResetStrategy::Full`], force-wake stays asserted: the chip
    /// is left awake for the driver-ownership handshake that follows.
    Rearm,
}

/// What a power sequence achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerReport {
    /// Strategy that ran.
    pub strategy: ResetStrategy,
    /// Last state reached.
    pub state: PowerState,
    /// Caveats collected on the way.
    pub outcome: Outcome,
}

/// Walks [`PowerState`] on one device.
#[derive(Debug)]
pub struct PowerSequencer<'a> {
    dev: &'a Device,
    state: PowerState,
    outcome: Outcome,
}

impl<'a> PowerSequencer<'a> {
    /// Sequencer for `dev`, starting from [`PowerState::Asleep`].
    pub fn new(dev: &'a Device) -> Self {
        Self {
            dev,
            state: PowerState::Asleep,
            outcome: Outcome::ok(),
        }
    }

    /// Current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Run `strategy` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BringupError::Timeout`] if a full reset never reports
    /// init done.
    pub fn run(mut self, strategy: ResetStrategy) -> Result<PowerReport> {
        tracing::info!("{}: power sequence ({strategy:?})", self.dev.variant().chip);

        match strategy {
            ResetStrategy::Full => {
                self.wake();
                self.power_on();
                self.clear_sleep_protect();
                self.subsystem_reset();
                if self.dev.variant().needs_fine_wf_reset {
                    self.fine_wf_reset();
                }
                self.release();
                self.claim_ownership();
                self.wait_init_done()?;
            }
            ResetStrategy::Rearm => {
                self.wake();
                self.dev.set(regs::CONN_AUX_CLK_EN, regs::WF_AUX_CLK_MASK);
                self.claim_ownership();
            }
        }

        Ok(PowerReport {
            strategy,
            state: self.state,
            outcome: self.outcome,
        })
    }

    fn advance(&mut self, to: PowerState) {
        tracing::debug!("power: {} -> {to}", self.state);
        self.state = to;
    }

    fn wake(&mut self) {
        let dev = self.dev;
        let v = dev.variant();

        dev.wr(regs::CONN_INFRA_WAKEUP_WF, 1);
        dev.sleep(v.delays.wake_settle);

        let out = dev.poll(
            regs::CONN_INFRA_VERSION,
            |val| v.accepts_version(val),
            v.timing.wake,
        );
        if out.reached() {
            tracing::info!("CONN_INFRA version {:#010x}", out.value());
        } else if let Some(c) = out.caveat("CONN_INFRA version", regs::CONN_INFRA_VERSION) {
            self.outcome.degrade(c);
        }
        self.advance(PowerState::InfraAwake);
    }

    fn power_on(&mut self) {
        let dev = self.dev;
        let v = dev.variant();

        if v.needs_power_on {
            dev.set(regs::CONN_AUX_CLK_EN, regs::WF_AUX_CLK_MASK);
            dev.clear(regs::WFSYS_CPU_SW_RST_B, regs::WFSYS_CPU_RELEASE);
            dev.clear(regs::SLP_PROT_EN, regs::SLP_PROT_WF_MASK);
            // Key and command must land in the same write.
            dev.wr(regs::TOP_PWR_CTL, regs::WF_PWR_KEY | regs::WF_PWR_ON);

            let out = dev.poll(
                regs::CONN_PWR_STATUS,
                |val| val & regs::PWR_ON_ACK != 0,
                v.timing.power_on,
            );
            if let Some(c) = out.caveat("WF power-on ack", regs::CONN_PWR_STATUS) {
                self.outcome.degrade(c);
            }
        }
        self.advance(PowerState::DomainPoweredOn);
    }

    fn clear_sleep_protect(&mut self) {
        let dev = self.dev;
        let spec = dev.variant().timing.sleep_protect;

        for (what, reg, busy) in [
            ("WF2CONN sleep protect", regs::SLP_PROT_WF2CONN_STA, regs::SLP_PROT_WF2CONN_BUSY),
            ("CONN2WF sleep protect", regs::SLP_PROT_CONN2WF_STA, regs::SLP_PROT_CONN2WF_BUSY),
            ("WFDMA2CONN sleep protect", regs::SLP_PROT_WFDMA2CONN_STA, regs::SLP_PROT_WFDMA2CONN_BUSY),
        ] {
            if let Some(c) = dev.poll(reg, |val| val & busy == 0, spec).caveat(what, reg) {
                self.outcome.degrade(c);
            }
        }
        self.advance(PowerState::CpuHeldInReset);
    }

    fn subsystem_reset(&mut self) {
        let dev = self.dev;
        let d = &dev.variant().delays;

        dev.wr(regs::CBTOP_GPIO_MODE5, regs::GPIO_MODE5_VALUE);
        dev.wr(regs::CBTOP_GPIO_MODE6, regs::GPIO_MODE6_VALUE);
        dev.sleep(d.gpio_settle);

        dev.wr(regs::CB_INFRA_RGU_BT_SUBSYS_RST, regs::SUBSYS_RST_ASSERT);
        dev.wr(regs::CB_INFRA_RGU_WF_SUBSYS_RST, regs::SUBSYS_RST_ASSERT);
        dev.sleep(d.reset_hold);
        dev.wr(regs::CB_INFRA_RGU_BT_SUBSYS_RST, regs::SUBSYS_RST_DEASSERT);
        dev.wr(regs::CB_INFRA_RGU_WF_SUBSYS_RST, regs::SUBSYS_RST_DEASSERT);
        dev.sleep(d.reset_release);

        tracing::info!("WF/BT subsystem reset done");
        self.advance(PowerState::SubsystemReset);
    }

    fn fine_wf_reset(&mut self) {
        let dev = self.dev;
        let d = &dev.variant().delays;
        let reg = regs::CB_INFRA_RGU_WF_SUBSYS_RST;
        let bit = regs::WF_SUBSYS_RST_BIT;

        let asserted = dev.rmw(reg, bit, bit);
        tracing::debug!("WF_SUBSYS_RST = {asserted:#010x} (asserted)");
        dev.sleep(d.fine_reset_hold);

        // The RGU may change other bits while reset is held.
        tracing::debug!("WF_SUBSYS_RST = {:#010x} after hold", dev.rr(reg));
        let released = dev.rmw(reg, bit, 0);
        tracing::debug!("WF_SUBSYS_RST = {released:#010x} (released)");
        dev.sleep(d.fine_reset_release);
    }

    fn release(&mut self) {
        let dev = self.dev;
        dev.wr(regs::CONN_INFRA_WAKEUP_WF, 0);
        dev.set(regs::SLP_PROT_EN, regs::SLP_PROT_WF_MASK);
        self.advance(PowerState::ResetReleased);
    }

    fn claim_ownership(&mut self) {
        let value = self.dev.rr(regs::CONN_SEMAPHORE);
        tracing::debug!("CONN_SEMAPHORE = {value:#010x}");
        if value & regs::SEMA00_OWNED_BY_MCU != 0 {
            self.outcome.degrade(Caveat::SemaphoreHeld { value });
        }
        self.advance(PowerState::OwnershipClaimed);
    }

    fn wait_init_done(&mut self) -> Result<()> {
        let dev = self.dev;
        let spec = dev.variant().timing.init_done;
        let value = dev
            .poll(
                regs::AP2WF_BUS,
                |val| val & regs::WFSYS_SW_INIT_DONE != 0,
                spec,
            )
            .or_fatal("WF subsystem init done", regs::AP2WF_BUS, spec)
            .inspect_err(|e| tracing::error!("{e}"))?;
        tracing::info!("WF subsystem init done ({value:#010x})");
        self.advance(PowerState::InitDone);
        Ok(())
    }
}

/// Hand the chip to firmware: `SET_OWN`, then wait for `OWN_SYNC`.
///
/// Returns a caveat if the firmware never acknowledged.
pub fn fw_own(dev: &Device) -> Option<Caveat> {
    dev.wr(regs::CONN_ON_LPCTL, lpctl::SET_OWN);
    let out = dev.poll(
        regs::CONN_ON_LPCTL,
        |v| v & lpctl::OWN_SYNC != 0,
        dev.variant().timing.ownership,
    );
    tracing::debug!("fw own: LPCTL = {:#010x}", out.value());
    out.caveat("firmware ownership", regs::CONN_ON_LPCTL)
}

/// Take the chip back: `CLR_OWN`, then wait for `OWN_SYNC` to drop.
///
/// # Errors
///
/// Returns [`crate::BringupError::Timeout`] if ownership never moves; no
/// further register access can be trusted then.
pub fn drv_own(dev: &Device) -> Result<()> {
    let spec = dev.variant().timing.ownership;
    dev.wr(regs::CONN_ON_LPCTL, lpctl::CLR_OWN);
    dev.poll(regs::CONN_ON_LPCTL, |v| v & lpctl::OWN_SYNC == 0, spec)
        .or_fatal("driver ownership", regs::CONN_ON_LPCTL, spec)?;
    tracing::debug!("driver own acquired");
    Ok(())
}
