// SPDX-License-Identifier: AGPL-3.0-only

//! On-disk firmware formats.
//!
//! Two images are loaded in order: a small ROM patch, then the RAM code.
//! They are usually shipped as separate files under `/lib/firmware/mediatek`,
//! sometimes packed together in an `MTK-` bundle.
//!
//! ## Patch (big-endian)
//!
//! ```text
//! 0    16  build_date
//! 16   4   platform
//! 20   4   hw_sw_ver
//! 24   4   patch_ver
//! 28   2   checksum
//! 30   2   rsv
//! 32   64  desc { patch_ver, subsys, feature, n_region, crc, rsv[11] }
//! 96   64 × n_region   sec { type, offs, size, info { addr, len, sec_key_idx, align_len, rsv[9] } }
//! ```
//!
//! ## RAM (little-endian, described from the end of the file)
//!
//! ```text
//! len - 36                          trailer { chip_id u8, eco_code u8, n_region u8,
//!                                             format_ver u8, format_flag u8, rsv[2],
//!                                             fw_ver[10], build_date[15], crc }
//! len - 36 - 40 × (n_region - i)    region i { decomp_crc, decomp_len, decomp_blk_sz,
//!                                              rsv[4], addr, len, feature_set,
//!                                              type, rsv1[14] }
//! ```
//!
//! Region payloads start at offset 0 and are laid back to back in region order.
//!
//! ## `MTK-` bundle (little-endian)
//!
//! ```text
//! 0    4   "MTK-"
//! 4    2   n_items
//! 6    2   unk1 (1)
//! 8    4   file size
//! 12   4   zero
//! 16   76 × n_items   entry { name[48], date[16], offset u32, size u32, zero u32 }
//! ```

use crate::regs::genmask;

/// Patch image layout.
pub mod patch {
    use super::genmask;

    /// Header length including the descriptor.
    pub const HEADER_LEN: usize = 96;
    /// Section descriptor length.
    pub const SECTION_LEN: usize = 64;
    /// Offset of `build_date`.
    pub const BUILD_DATE_OFFSET: usize = 0;
    /// Length of `build_date`.
    pub const BUILD_DATE_LEN: usize = 16;
    /// Offset of `platform`.
    pub const PLATFORM_OFFSET: usize = 16;
    /// Length of `platform`.
    pub const PLATFORM_LEN: usize = 4;
    /// Offset of `hw_sw_ver`.
    pub const HW_SW_VER_OFFSET: usize = 20;
    /// Offset of `patch_ver`.
    pub const PATCH_VER_OFFSET: usize = 24;
    /// Offset of `desc.n_region`.
    pub const N_REGION_OFFSET: usize = 32 + 12;

    /// Section type field.
    pub const SEC_TYPE_MASK: u32 = genmask(15, 0);
    /// Downloadable section type.
    pub const SEC_TYPE_INFO: u32 = 0x2;

    /// Encryption type field of `sec_key_idx`.
    pub const SEC_ENC_TYPE_MASK: u32 = genmask(31, 24);
    /// Plain text.
    pub const SEC_ENC_TYPE_PLAIN: u32 = 0x00;
    /// AES with key index.
    pub const SEC_ENC_TYPE_AES: u32 = 0x01;
    /// Scrambled.
    pub const SEC_ENC_TYPE_SCRAMBLE: u32 = 0x02;
    /// AES key index field of `sec_key_idx`.
    pub const SEC_ENC_AES_KEY_MASK: u32 = genmask(7, 0);
    /// `sec_key_idx` value meaning "no security info".
    pub const SEC_INFO_NOT_SUPPORT: u32 = 0xffff_ffff;
}

/// RAM image layout.
pub mod ram {
    /// Trailer length.
    pub const TRAILER_LEN: usize = 36;
    /// Region descriptor length.
    pub const REGION_LEN: usize = 40;
    /// Length of `fw_ver`.
    pub const FW_VER_LEN: usize = 10;
    /// Length of `build_date`.
    pub const BUILD_DATE_LEN: usize = 15;

    /// Region payload is encrypted.
    pub const FEATURE_SET_ENCRYPT: u8 = 1 << 0;
    /// Key index field.
    pub const FEATURE_KEY_IDX: u8 = 0b110;
    /// Scrambled rather than AES.
    pub const FEATURE_ENCRY_MODE: u8 = 1 << 4;
    /// Region address overrides the firmware start address.
    pub const FEATURE_OVERRIDE_ADDR: u8 = 1 << 5;
    /// Region is not downloaded.
    pub const FEATURE_NON_DL: u8 = 1 << 6;
}

/// `MTK-` bundle layout.
pub mod bundle {
    /// Magic at offset 0.
    pub const MAGIC: &[u8; 4] = b"MTK-";
    /// Header length.
    pub const HEADER_LEN: usize = 16;
    /// Entry length.
    pub const ENTRY_LEN: usize = 76;
    /// Length of an entry name.
    pub const NAME_LEN: usize = 48;
    /// Length of an entry date.
    pub const DATE_LEN: usize = 16;
    /// Expected `unk1`.
    pub const UNK1: u16 = 1;
}
