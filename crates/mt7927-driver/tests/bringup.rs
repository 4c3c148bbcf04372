// SPDX-License-Identifier: AGPL-3.0-only

//! Bring-up sequences against the simulated chip
//!
//! Every path through `Bringup` runs here end to end: full bring-up,
//! degraded runs, fatal faults, recovery and suspend/resume.

use bytes::Bytes;
use mt7927_chip::fw::ram::{FEATURE_NON_DL, FEATURE_OVERRIDE_ADDR};
use mt7927_chip::regs::{self, glo_cfg, lpctl};
use mt7927_chip::variant::{VariantConfig, MT7925, MT7927};
use mt7927_driver::firmware::{MemorySource, PatchImageBuilder, RamImageBuilder};
use mt7927_driver::sim::{Faults, Simulator, SIM_RUNNING_INDEX};
use mt7927_driver::{
    Bringup, BringupConfig, BringupError, BringupPath, Caveat, McuState, RunConfidence,
};
use tracing_subscriber::EnvFilter;

const OVERRIDE: u32 = 0x00e0_0000;

fn blob(len: usize, seed: u8) -> Bytes {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect::<Vec<_>>().into()
}

fn firmware(config: &BringupConfig) -> MemorySource {
    let patch = PatchImageBuilder::new()
        .build_date("20250101120000a")
        .platform("ALPS")
        .version(0x8a10_8a10, 0x0000_0001)
        .section(0x20_0000, blob(5000, 1))
        .other_section(0x3, blob(64, 2))
        .build()
        .expect("patch image");
    let ram = RamImageBuilder::new(0x27, 0x01)
        .fw_ver("1.2.3")
        .build_date("20250101120000")
        .region(0x0220_0000, blob(3000, 3))
        .region_with_features(0x0090_0000, FEATURE_NON_DL, blob(100, 4))
        .region_with_features(OVERRIDE, FEATURE_OVERRIDE_ADDR, blob(2048, 5))
        .build()
        .expect("ram image");
    MemorySource::new()
        .with(&config.patch_name, patch)
        .with(&config.ram_name, ram)
}

/// Route driver logs to the test harness; `RUST_LOG=mt7927_driver=debug`
/// shows the register trace of a failing scenario.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bringup_for(variant: &'static VariantConfig) -> Bringup {
    init_logging();
    let config = BringupConfig::for_variant(variant);
    let source = firmware(&config);
    Bringup::new(config, Box::new(source))
}

fn faulty(faults: Faults) -> Simulator {
    Simulator::with_faults(&MT7927, faults)
}

#[test]
fn test_full_bringup_confirms_running() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert_eq!(report.path, BringupPath::Full);
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert!(report.outcome.is_ok(), "caveats: {:?}", report.outcome.caveats());
    assert!(dev.is_running());
    assert_eq!(dev.mcu_state(), McuState::Running(SIM_RUNNING_INDEX));

    // One patch section; the NON_DL region is skipped.
    assert_eq!(report.patch.len(), 1);
    assert_eq!(report.patch[0].chunks, 3);
    let ram: Vec<_> = report.ram.iter().map(|r| r.addr).collect();
    assert_eq!(ram, [0x0220_0000, OVERRIDE]);
    assert_eq!(dev.state().override_addr, Some(OVERRIDE));
    assert!(dev.state().rev.is_some());

    let power = report.power.expect("power report");
    assert_eq!(power.state, mt7927_driver::PowerState::InitDone);
}

#[test]
fn test_firmware_bytes_arrive_in_order() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    let sent: Vec<u8> = sim.scatter_chunks().concat();
    let expected = [blob(5000, 1), blob(3000, 3), blob(2048, 5)].concat();
    assert_eq!(sent, expected);
}

#[test]
fn test_host_side_armed() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    let ccif_ack = regs::CCIF_BASE + regs::CCIF_ACK;
    assert_eq!(sim.writes(ccif_ack), [u32::MAX]);
    assert_eq!(sim.writes(regs::PCIE2AP_REMAP_WF), [regs::PCIE2AP_REMAP_WF_VALUE]);
    assert_eq!(sim.writes(regs::PCIE_MAC_INT_CONFIG), [regs::PCIE_MAC_INT_CONFIG_VALUE]);
    assert_eq!(sim.writes(regs::CB_INFRA_CRYPTO_MCU_OWN), [1]);

    let irq = *dev.irq();
    assert_eq!(sim.writes(regs::WFDMA0_HOST_INT_ENA_SET), [irq.host_bits]);
    assert_eq!(sim.writes(regs::PCIE_MAC_INT_ENABLE).last(), Some(&0xff));
    assert_ne!(sim.peek(regs::MCU2HOST_SW_INT_ENA) & irq.mcu2host_wake, 0);

    let glo = sim.peek(regs::WFDMA0_GLO_CFG);
    assert_eq!(glo & (glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN), glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN);
    assert_ne!(sim.peek(regs::AP2WF_BUS) & regs::WFSYS_SW_INIT_DONE, 0);
}

#[test]
fn test_mt7925_skips_mt7927_steps() {
    let sim = Simulator::new(&MT7925);
    let mut dev = sim.device();
    let report = bringup_for(&MT7925).bring_up(&mut dev).expect("bring-up");

    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert!(sim.writes(regs::CCIF_BASE + regs::CCIF_ACK).is_empty());
    assert!(sim.writes(regs::CB_INFRA_CRYPTO_MCU_OWN).is_empty());
    assert!(sim.writes(regs::TOP_PWR_CTL).is_empty());
    // No set register: enable goes through read-modify-write.
    assert!(sim.writes(regs::WFDMA0_HOST_INT_ENA_SET).is_empty());
    let irq = *dev.irq();
    assert_eq!(sim.peek(regs::WFDMA0_HOST_INT_ENA) & irq.host_bits, irq.host_bits);
}

#[test]
fn test_stalled_firmware_assumed_running() {
    let sim = faulty(Faults {
        firmware_stalls: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert_eq!(report.confidence, Some(RunConfidence::Assumed));
    assert!(dev.is_running());
    assert!(report.outcome.is_degraded());
    assert!(report
        .outcome
        .caveats()
        .contains(&Caveat::FirmwareNotStarted { last: MT7927.idle_magic }));
    assert!(sim.elapsed() >= MT7927.timing.mcu_running.budget());
}

#[test]
fn test_power_ack_timeout_continues() {
    let sim = faulty(Faults {
        no_power_ack: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert_eq!(sim.reads(regs::CONN_PWR_STATUS), MT7927.timing.power_on.max_iterations);
    assert!(dev.is_running());
    assert!(matches!(
        report.outcome.caveats(),
        [Caveat::PollTimedOut { register: regs::CONN_PWR_STATUS, .. }]
    ));
}

#[test]
fn test_semaphore_held_is_caveat() {
    let sim = faulty(Faults {
        semaphore_owned: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert!(dev.is_running());
    assert_eq!(report.outcome.caveats(), [Caveat::SemaphoreHeld { value: 1 }]);
}

#[test]
fn test_crash_mid_transfer_is_fatal() {
    let sim = faulty(Faults {
        crash_after_chunks: Some(2),
        ..Faults::default()
    });
    let mut dev = sim.device();
    let err = bringup_for(&MT7927).bring_up(&mut dev).expect_err("crash");

    assert!(err.is_crash(), "{err}");
    assert!(!dev.is_running());
    assert_eq!(sim.writes(regs::CONN_INFRA_WAKEUP_WF).last(), Some(&0));
    // The patch is three chunks: the crash shows at the section's final
    // check and no RAM region is sent.
    assert_eq!(sim.scatter_chunks().len(), 3);
    assert_eq!(dev.mcu_state(), McuState::Crashed);
}

#[test]
fn test_crash_at_firmware_start_is_fatal() {
    let sim = faulty(Faults {
        crash_on_start: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    let err = bringup.bring_up(&mut dev).expect_err("crash on start");

    assert!(
        matches!(err, BringupError::McuCrashed { status } if status == MT7927.crashed_magic),
        "{err}"
    );
    assert!(!dev.is_running());
    assert_eq!(dev.state().run_confidence, None);
    assert_eq!(sim.writes(regs::CONN_INFRA_WAKEUP_WF).last(), Some(&0));
    // Everything was downloaded; the MCU died on the host-ready nudge.
    assert_eq!(sim.scatter_chunks().concat().len(), 5000 + 3000 + 2048);

    sim.set_faults(Faults::default());
    let report = bringup.recover(&mut dev).expect("recover");
    assert_eq!(report.path, BringupPath::Full);
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
}

#[test]
fn test_power_poll_timeouts_are_independent_caveats() {
    let sim = faulty(Faults {
        sleep_protect_stuck: true,
        bad_conninfra_version: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert!(dev.is_running());
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    let timed_out: Vec<_> = report
        .outcome
        .caveats()
        .iter()
        .map(|c| match c {
            Caveat::PollTimedOut { register, last, .. } => (*register, *last),
            other => panic!("unexpected caveat {other}"),
        })
        .collect();
    assert_eq!(
        timed_out,
        [
            (regs::CONN_INFRA_VERSION, 0),
            (regs::SLP_PROT_WF2CONN_STA, regs::SLP_PROT_WF2CONN_BUSY),
            (regs::SLP_PROT_CONN2WF_STA, regs::SLP_PROT_CONN2WF_BUSY),
            (regs::SLP_PROT_WFDMA2CONN_STA, regs::SLP_PROT_WFDMA2CONN_BUSY),
        ]
    );
    // The power report carries the same caveats.
    assert_eq!(report.power.expect("power report").outcome.caveats().len(), 4);
}

#[test]
fn test_recover_after_crash_runs_full_bringup() {
    let sim = faulty(Faults {
        crash_after_chunks: Some(2),
        ..Faults::default()
    });
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    bringup.bring_up(&mut dev).expect_err("crash");

    let report = bringup.recover(&mut dev).expect("recover");
    assert_eq!(report.path, BringupPath::Full);
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert!(dev.is_running());
}

#[test]
fn test_post_failure_is_fatal() {
    let sim = faulty(Faults {
        fail_post_at: Some(0),
        ..Faults::default()
    });
    let mut dev = sim.device();
    let err = bringup_for(&MT7927).bring_up(&mut dev).expect_err("post failure");

    assert!(matches!(err, BringupError::TransferFailed { .. }));
    assert!(!dev.is_running());
    assert_eq!(sim.writes(regs::CONN_INFRA_WAKEUP_WF).last(), Some(&0));
}

#[test]
fn test_patch_finish_failure_tolerated() {
    // Frames: configure, 3 chunks, then PATCH_FINISH.
    let sim = faulty(Faults {
        fail_post_at: Some(4),
        ..Faults::default()
    });
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).bring_up(&mut dev).expect("bring-up");

    assert!(dev.is_running());
    assert!(matches!(
        report.outcome.caveats(),
        [Caveat::CommandDropped { what: "PATCH_FINISH", .. }]
    ));
}

#[test]
fn test_init_done_timeout_is_fatal() {
    let sim = faulty(Faults {
        init_done_never: true,
        ..Faults::default()
    });
    let mut dev = sim.device();
    let err = bringup_for(&MT7927).bring_up(&mut dev).expect_err("timeout");

    assert!(matches!(err, BringupError::Timeout { register: regs::AP2WF_BUS, .. }));
    assert!(sim.frames().is_empty());
    assert!(!dev.is_running());
}

#[test]
fn test_missing_firmware() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let bringup = Bringup::new(BringupConfig::default(), Box::new(MemorySource::new()));
    let err = bringup.bring_up(&mut dev).expect_err("no firmware");

    assert!(err.is_firmware_fault());
    assert!(matches!(err, BringupError::FirmwareNotFound { .. }));
}

#[test]
fn test_recover_when_running_rearms_only() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    bringup.bring_up(&mut dev).expect("bring-up");
    let chunks = sim.scatter_chunks().len();
    let resets = sim.writes(regs::CB_INFRA_RGU_WF_SUBSYS_RST).len();

    let report = bringup.recover(&mut dev).expect("recover");

    assert_eq!(report.path, BringupPath::Rearm);
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert!(report.patch.is_empty() && report.ram.is_empty());
    assert_eq!(sim.scatter_chunks().len(), chunks);
    assert_eq!(sim.writes(regs::CB_INFRA_RGU_WF_SUBSYS_RST).len(), resets);
}

#[test]
fn test_recover_idle_reloads_without_reset() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).recover(&mut dev).expect("recover");

    assert_eq!(report.path, BringupPath::Reload);
    assert_eq!(report.patch.len(), 1);
    assert_eq!(report.ram.len(), 2);
    assert!(sim.writes(regs::CB_INFRA_RGU_WF_SUBSYS_RST).is_empty());
    assert!(dev.is_running());
}

#[test]
fn test_recover_unmarked_running_resets() {
    let sim = Simulator::new(&MT7927);
    sim.poke(regs::ROMCODE_INDEX, SIM_RUNNING_INDEX);
    let mut dev = sim.device();
    let report = bringup_for(&MT7927).recover(&mut dev).expect("recover");

    assert_eq!(report.path, BringupPath::Full);
    assert!(!sim.writes(regs::CB_INFRA_RGU_WF_SUBSYS_RST).is_empty());
}

#[test]
fn test_suspend_resume_round_trip() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    bringup.bring_up(&mut dev).expect("bring-up");

    let outcome = bringup.suspend_prepare(&mut dev).expect("suspend");
    assert!(outcome.is_ok());
    assert!(dev.is_suspended());
    assert_eq!(sim.peek(regs::WFDMA0_GLO_CFG) & (glo_cfg::TX_DMA_EN | glo_cfg::RX_DMA_EN), 0);
    assert_eq!(sim.peek(regs::WFDMA0_HOST_INT_ENA), 0);
    assert_eq!(sim.peek(regs::PCIE_MAC_INT_ENABLE), 0);
    assert_eq!(sim.peek(regs::CONN_ON_LPCTL), lpctl::OWN_SYNC);

    let err = bringup.suspend_prepare(&mut dev).expect_err("double suspend");
    assert!(matches!(err, BringupError::InvalidState { .. }));

    let report = bringup.resume_restore(&mut dev).expect("resume");
    assert_eq!(report.path, BringupPath::Resume);
    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert!(!dev.is_suspended());
    assert!(dev.is_running());
    assert_eq!(sim.peek(regs::CONN_ON_LPCTL), 0);
    assert_eq!(sim.peek(regs::PCIE_MAC_INT_ENABLE), 0xff);
    assert_ne!(sim.peek(regs::WFDMA0_GLO_CFG) & glo_cfg::TX_DMA_EN, 0);

    let err = bringup.resume_restore(&mut dev).expect_err("not suspended");
    assert!(matches!(err, BringupError::InvalidState { .. }));
}

#[test]
fn test_resume_after_crash_recovers() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    bringup.bring_up(&mut dev).expect("bring-up");
    bringup.suspend_prepare(&mut dev).expect("suspend");

    sim.crash();
    let report = bringup.resume_restore(&mut dev).expect("resume");

    assert_eq!(report.path, BringupPath::Full);
    assert!(dev.is_running());
    assert!(!dev.is_suspended());
}

#[test]
fn test_suspend_with_busy_dma_degrades() {
    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let bringup = bringup_for(&MT7927);
    bringup.bring_up(&mut dev).expect("bring-up");

    sim.set_faults(Faults {
        dma_stuck_busy: true,
        ..Faults::default()
    });
    let outcome = bringup.suspend_prepare(&mut dev).expect("suspend");

    assert!(matches!(
        outcome.caveats(),
        [Caveat::PollTimedOut { register: regs::WFDMA0_GLO_CFG, .. }]
    ));
    assert!(dev.is_suspended());
}

#[test]
#[ignore] // Requires hardware
fn test_hardware_bringup() {
    let addr = std::env::var("MT7927_PCIE_ADDR").unwrap_or_else(|_| "0000:01:00.0".into());
    let queue = Box::new(NullQueue);
    let mut dev = mt7927_driver::Device::open(&addr, queue, &MT7927).expect("map BAR0");
    let bringup = Bringup::from_config(BringupConfig::from_env(&MT7927));
    let report = bringup.bring_up(&mut dev).expect("bring-up");
    println!("{:?} ({} caveats)", report.confidence, report.outcome.caveats().len());
}

/// Drops every frame. Enough to exercise register sequencing on real silicon.
struct NullQueue;

impl mt7927_driver::queue::HostQueue for NullQueue {
    fn post_raw(&mut self, _frame: mt7927_driver::queue::TxFrame) -> mt7927_driver::Result<()> {
        Ok(())
    }

    fn reclaim(&mut self, _queue: mt7927_driver::queue::QueueId, _force: bool) {}
}
