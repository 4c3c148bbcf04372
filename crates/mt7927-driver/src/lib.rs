// SPDX-License-Identifier: AGPL-3.0-only

//! Bring-up sequencer for MediaTek MT7927 / MT6639 WiFi co-processors.
//!
//! Takes the chip from cold (or crashed) to "firmware running": power and
//! reset, boot-ROM handshake, patch and RAM download, host interrupt setup.
//! The host framework supplies BAR0 access and the DMA queues; this crate
//! decides what to write, in which order, and what to wait for.
//!
//! # Layers
//!
//! ```text
//! Bringup          bring_up / recover / suspend_prepare / resume_restore
//!   ├─ PowerSequencer    power, reset, ownership
//!   ├─ transfer          configure + scatter chunks, crash checks
//!   └─ firmware          patch / RAM / bundle parsing, firmware sources
//! Device           register shim, MCU channel, IRQ map, variant, clock
//!   ├─ RegisterShim      fixed / L1 / L2 remapping over a RegisterBus
//!   └─ McuChannel        TXD framing over a HostQueue
//! ```
//!
//! Real hardware goes through [`MmioBus`]; [`sim::Simulator`] replaces the
//! chip, the queues and the clock for tests and dry runs.
//!
//! # Quick start
//!
//! ```
//! use mt7927_chip::variant::MT7927;
//! use mt7927_driver::firmware::{MemorySource, PatchImageBuilder, RamImageBuilder};
//! use mt7927_driver::sim::Simulator;
//! use mt7927_driver::{Bringup, BringupConfig, RunConfidence};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BringupConfig::for_variant(&MT7927);
//! let patch = PatchImageBuilder::new().section(0x20_0000, vec![0u8; 4096]).build()?;
//! let ram = RamImageBuilder::new(0x27, 0x01).region(0x90_0000, vec![0u8; 8192]).build()?;
//! let source = MemorySource::new()
//!     .with(&config.patch_name, patch)
//!     .with(&config.ram_name, ram);
//!
//! let sim = Simulator::new(&MT7927);
//! let mut dev = sim.device();
//! let report = Bringup::new(config, Box::new(source)).bring_up(&mut dev)?;
//!
//! assert!(dev.is_running());
//! assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Every step logs through `tracing`: `info` for milestones, `debug` for
//! register values, `warn` for each [`Caveat`], `error` before a fatal
//! return. Binaries install a subscriber; the library never does.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod bringup;
mod clock;
mod config;
mod device;
mod error;
pub mod firmware;
pub mod mcu;
pub mod mmio;
mod outcome;
pub mod poll;
mod power;
pub mod queue;
mod remap;
pub mod sim;
pub mod transfer;

/// Chip constants (re-exported from mt7927-chip).
pub mod chip {
    pub use mt7927_chip::pcie::{device_id, lspci_filter, ChipVariant, ALL_DEVICE_IDS, MEDIATEK_VENDOR_ID};
    pub use mt7927_chip::regs;
    pub use mt7927_chip::variant::{PollSpec, VariantConfig, MT7925, MT7927};
}

pub use bringup::{Bringup, BringupPath, BringupReport};
pub use clock::{Clock, SystemClock};
pub use config::{BringupConfig, ENV_FIRMWARE_DIR, ENV_PATCH, ENV_RAM};
pub use device::{Device, DeviceState, IrqMap, McuState, RunConfidence};
pub use error::{BringupError, Result};
pub use mmio::{MmioBus, RegisterBus};
pub use outcome::{Caveat, Outcome};
pub use power::{drv_own, fw_own, PowerReport, PowerSequencer, PowerState, ResetStrategy};
pub use remap::RegisterShim;
pub use transfer::SectionReport;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Bringup, BringupConfig, BringupError, BringupReport, Caveat, Device, McuState, Outcome,
        Result, RunConfidence,
    };
}
