// SPDX-License-Identifier: AGPL-3.0-only

//! Firmware containers and where they come from.
//!
//! Parsing is all-or-nothing: an image either parses completely, with every
//! section/region proven to lie inside the buffer, or is rejected before a
//! single byte is sent to the device. Payloads are zero-copy [`Bytes`]
//! slices of the loaded file.

mod bundle;
mod patch;
mod ram;
mod source;

pub use bundle::{Bundle, BundleBuilder, BundleEntry};
pub use patch::{PatchHeader, PatchImage, PatchImageBuilder, PatchSection};
pub use ram::{RamImage, RamImageBuilder, RamRegion, RamTrailer};
pub use source::{BundleSource, DirectorySource, FirmwareSource, MemorySource};

use std::ops::Range;

use bytes::Bytes;
use mt7927_chip::fw::patch::{
    SEC_ENC_AES_KEY_MASK, SEC_ENC_TYPE_AES, SEC_ENC_TYPE_MASK, SEC_ENC_TYPE_PLAIN,
    SEC_ENC_TYPE_SCRAMBLE, SEC_INFO_NOT_SUPPORT,
};
use mt7927_chip::mcu::dl_mode;
use mt7927_chip::regs::{field_get, field_prep};

use crate::error::{BringupError, Result};

/// How a patch section is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Plain text (or no security info).
    Plain,
    /// AES with a key slot.
    Aes {
        /// Key index.
        key_idx: u8,
    },
    /// Scrambled.
    Scrambled,
    /// Type the boot ROM does not know; sent as plain.
    Unsupported(u8),
}

impl EncryptionMode {
    /// Decode a patch section's `sec_key_idx` word.
    pub fn from_sec_info(info: u32) -> Self {
        if info == SEC_INFO_NOT_SUPPORT {
            return Self::Plain;
        }
        // Both fields are 8 bits wide.
        #[allow(clippy::cast_possible_truncation)]
        match field_get(SEC_ENC_TYPE_MASK, info) {
            SEC_ENC_TYPE_PLAIN => Self::Plain,
            SEC_ENC_TYPE_AES => Self::Aes {
                key_idx: (info & SEC_ENC_AES_KEY_MASK) as u8,
            },
            SEC_ENC_TYPE_SCRAMBLE => Self::Scrambled,
            other => Self::Unsupported(other as u8),
        }
    }

    /// Download-mode flags for the configure request.
    pub fn dl_mode(self) -> u32 {
        match self {
            Self::Plain | Self::Unsupported(_) => 0,
            Self::Aes { key_idx } => {
                dl_mode::ENCRYPT
                    | field_prep(dl_mode::KEY_IDX, u32::from(key_idx))
                    | dl_mode::RESET_SEC_IV
            }
            Self::Scrambled => dl_mode::ENCRYPT | dl_mode::ENCRY_MODE_SEL | dl_mode::RESET_SEC_IV,
        }
    }
}

/// Checked byte range `offset..offset + len` inside a buffer of `limit` bytes.
fn checked_range(
    what: impl FnOnce() -> String,
    offset: u32,
    len: u32,
    limit: usize,
) -> Result<Range<usize>> {
    let limit64 = limit as u64;
    let end = u64::from(offset).checked_add(u64::from(len));
    match end {
        Some(end) if end <= limit64 => {
            // end <= limit, which is a usize.
            #[allow(clippy::cast_possible_truncation)]
            Ok(offset as usize..end as usize)
        }
        _ => Err(BringupError::out_of_bounds(
            what(),
            u64::from(offset),
            u64::from(len),
            limit64,
        )),
    }
}

/// NUL-terminated fixed-width string field.
fn fixed_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

/// Zero-pad `s` into an `N`-byte field.
fn pad<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let n = s.len().min(N);
    out[..n].copy_from_slice(&s.as_bytes()[..n]);
    out
}

/// Length of a payload as a `u32` wire field.
fn wire_len(image: &'static str, data: &Bytes) -> Result<u32> {
    u32::try_from(data.len())
        .map_err(|_| BringupError::format(image, format!("payload of {} bytes too large", data.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_modes() {
        assert_eq!(EncryptionMode::from_sec_info(0xffff_ffff), EncryptionMode::Plain);
        assert_eq!(EncryptionMode::from_sec_info(0x0000_0000), EncryptionMode::Plain);
        assert_eq!(
            EncryptionMode::from_sec_info(0x0100_0002),
            EncryptionMode::Aes { key_idx: 2 }
        );
        assert_eq!(EncryptionMode::from_sec_info(0x0200_0000), EncryptionMode::Scrambled);
        assert_eq!(EncryptionMode::from_sec_info(0x0700_0000), EncryptionMode::Unsupported(7));
    }

    #[test]
    fn patch_download_modes() {
        assert_eq!(EncryptionMode::Plain.dl_mode(), 0);
        assert_eq!(EncryptionMode::Aes { key_idx: 1 }.dl_mode(), 0b1011);
        assert_eq!(EncryptionMode::Scrambled.dl_mode(), 0b100_1001);
        assert_eq!(EncryptionMode::Scrambled.dl_mode() & dl_mode::NEED_RSP, 0);
    }

    #[test]
    fn ranges() {
        assert_eq!(checked_range(String::new, 64, 100, 200).unwrap(), 64..164);
        assert_eq!(checked_range(String::new, 100, 100, 200).unwrap(), 100..200);
        assert!(checked_range(String::new, 150, 100, 200).is_err());
        assert!(checked_range(String::new, u32::MAX, 2, 10).is_err());
    }

    #[test]
    fn strings() {
        assert_eq!(fixed_str(b"20240101\0\0\0garbage"), "20240101");
        assert_eq!(fixed_str(b"ALPS"), "ALPS");
        assert_eq!(pad::<6>("abc"), *b"abc\0\0\0");
        assert_eq!(pad::<2>("abc"), *b"ab");
    }
}
