// SPDX-License-Identifier: AGPL-3.0-only

//! MCU command protocol: command IDs, download-mode flags and TXD layout.
//!
//! Every command except [`cmd::FW_SCATTER`] is prefixed with a 64-byte MCU
//! TXD. Scatter frames are raw payload on the firmware-download ring; they
//! still consume a sequence number so the counter stays in step with the
//! boot ROM's expectations.
//!
//! ```text
//! off  size  field
//! 0    4     dw0: TX_BYTES[15:0] | PKT_FMT[24:23] | Q_IDX[31:25]
//! 4    4     dw1: HDR_FORMAT[17:16] | LONG_FORMAT[31]
//! 8    24    dw2..dw7 (zero)
//! 32   2     len (bytes after the 32-byte hardware header)
//! 34   2     pq_id
//! 36   1     cid
//! 37   1     pkt_type (0xa0)
//! 38   1     set_query (3 = "not applicable")
//! 39   1     seq
//! 40   24    ext fields + reserved (zero)
//! ```

use crate::regs::{bit, genmask};

/// Command IDs understood by the boot ROM.
pub mod cmd {
    /// Declare destination address, length and mode for the next scatter.
    pub const TARGET_ADDRESS_LEN_REQ: u8 = 0x01;
    /// Jump to the loaded RAM image.
    pub const FW_START_REQ: u8 = 0x02;
    /// Patch variant of [`TARGET_ADDRESS_LEN_REQ`].
    pub const PATCH_START_REQ: u8 = 0x05;
    /// All patch sections sent.
    pub const PATCH_FINISH_REQ: u8 = 0x07;
    /// Patch semaphore (not implemented by the MT7927 ROM).
    pub const PATCH_SEM_CONTROL: u8 = 0x10;
    /// Raw firmware data.
    pub const FW_SCATTER: u8 = 0xee;
}

/// Download-mode flags carried in the configure request.
pub mod dl_mode {
    use super::{bit, genmask};
    /// Payload is encrypted.
    pub const ENCRYPT: u32 = bit(0);
    /// Key index field.
    pub const KEY_IDX: u32 = genmask(2, 1);
    /// Reset the security IV before this section.
    pub const RESET_SEC_IV: u32 = bit(3);
    /// Target is CR4 working PDA.
    pub const WORKING_PDA_CR4: u32 = bit(4);
    /// Scramble instead of AES.
    pub const ENCRY_MODE_SEL: u32 = bit(6);
    /// Ask for a mailbox response. Never set: the MT7927 ROM does not answer.
    pub const NEED_RSP: u32 = bit(31);
}

/// Patch addresses that take [`cmd::PATCH_START_REQ`] regardless of caller.
pub const PATCH_ADDRESSES: &[u32] = &[0x20_0000, 0x90_0000, 0xe000_2800];

/// Length of the MCU TXD prepended to non-scatter commands.
pub const TXD_LEN: usize = 64;
/// Length of the hardware part of the TXD (`txd[8]`).
pub const HW_TXD_LEN: usize = 32;

/// TXD dword 0 fields.
pub mod txd0 {
    use super::genmask;
    /// Total frame length including the TXD.
    pub const TX_BYTES: u32 = genmask(15, 0);
    /// Packet format.
    pub const PKT_FMT: u32 = genmask(24, 23);
    /// Destination queue.
    pub const Q_IDX: u32 = genmask(31, 25);
    /// [`PKT_FMT`] value for commands.
    pub const PKT_FMT_CMD: u32 = 1;
    /// [`Q_IDX`] value for the MCU command queue.
    pub const Q_IDX_MCU: u32 = 0x20;
}

/// TXD dword 1 fields.
pub mod txd1 {
    use super::{bit, genmask};
    /// Header format.
    pub const HDR_FORMAT: u32 = genmask(17, 16);
    /// Long TXD.
    pub const LONG_FORMAT: u32 = bit(31);
    /// [`HDR_FORMAT`] value for commands.
    pub const HDR_FORMAT_CMD: u32 = 1;
}

/// Port/queue ID for host-to-MCU commands.
pub const PQ_ID_MCU: u16 = (1 << 15) | (3 << 10);
/// Packet type for MCU commands.
pub const PKT_TYPE_CMD: u8 = 0xa0;
/// `set_query` value when the command is neither set nor query.
pub const SET_QUERY_NA: u8 = 3;

/// Width mask of the sequence number.
pub const SEQ_MASK: u8 = 0xf;

/// Next sequence number after `seq`: 4-bit, wrapping, never 0.
#[must_use]
pub const fn next_seq(seq: u8) -> u8 {
    let next = seq.wrapping_add(1) & SEQ_MASK;
    if next == 0 {
        1
    } else {
        next
    }
}

/// Configure command for a destination address.
#[must_use]
pub fn config_cmd(addr: u32, is_patch: bool) -> u8 {
    if is_patch || PATCH_ADDRESSES.contains(&addr) {
        cmd::PATCH_START_REQ
    } else {
        cmd::TARGET_ADDRESS_LEN_REQ
    }
}
