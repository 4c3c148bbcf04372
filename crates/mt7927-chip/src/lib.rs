// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for MediaTek MT7927 / MT6639 and MT7925 WiFi co-processors.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the silicon as seen from the host: register addresses, the
//! logical-to-BAR0 remap table, the boot ROM's command protocol, the firmware
//! container formats, and the per-variant bring-up policy tables.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor/device IDs, [`pcie::ChipVariant`] |
//! | [`regs`] | Register map and bit definitions |
//! | [`remap`] | Fixed remap tables, L1/L2 window arithmetic |
//! | [`mcu`] | Command IDs, download-mode flags, TXD layout, sequence numbers |
//! | [`fw`] | Patch, RAM and `MTK-` bundle layouts |
//! | [`variant`] | Poll bounds, delays and magic values per chip |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unreadable_literal)]

pub mod fw;
pub mod mcu;
pub mod pcie;
pub mod regs;
pub mod remap;
pub mod variant;
