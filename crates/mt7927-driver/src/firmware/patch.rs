// SPDX-License-Identifier: AGPL-3.0-only

//! ROM patch container (big-endian).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mt7927_chip::fw::patch::{
    BUILD_DATE_LEN, BUILD_DATE_OFFSET, HEADER_LEN, HW_SW_VER_OFFSET, N_REGION_OFFSET,
    PATCH_VER_OFFSET, PLATFORM_LEN, PLATFORM_OFFSET, SECTION_LEN, SEC_INFO_NOT_SUPPORT,
    SEC_TYPE_INFO, SEC_TYPE_MASK,
};

use super::{checked_range, fixed_str, pad, wire_len, EncryptionMode};
use crate::error::{BringupError, Result};

const IMAGE: &str = "patch";

/// Patch header fields worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHeader {
    /// Build date string.
    pub build_date: String,
    /// Platform tag, e.g. `ALPS`.
    pub platform: String,
    /// Hardware/software version word.
    pub hw_sw_ver: u32,
    /// Patch version word.
    pub patch_ver: u32,
    /// Number of section descriptors.
    pub n_region: u32,
}

/// One section descriptor and its payload.
#[derive(Debug, Clone)]
pub struct PatchSection {
    /// Position in the section table.
    pub index: usize,
    /// Raw type word.
    pub sec_type: u32,
    /// Load address on the device.
    pub addr: u32,
    /// Bytes to download.
    pub len: u32,
    /// Payload offset in the file.
    pub offset: u32,
    /// Raw `sec_key_idx` word.
    pub sec_info: u32,
    /// Decoded protection.
    pub encryption: EncryptionMode,
    /// Payload slice; empty for sections that are not downloaded.
    pub payload: Bytes,
}

impl PatchSection {
    /// Whether the section carries code for the device.
    pub fn is_downloadable(&self) -> bool {
        self.sec_type & SEC_TYPE_MASK == SEC_TYPE_INFO
    }
}

/// A parsed ROM patch.
#[derive(Debug, Clone)]
pub struct PatchImage {
    header: PatchHeader,
    sections: Vec<PatchSection>,
}

impl PatchImage {
    /// Parse a patch file.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::Format`] if the header or section table is
    /// truncated, or [`BringupError::OutOfBounds`] if any section payload
    /// lies outside the file.
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(BringupError::format(
                IMAGE,
                format!("{} bytes, header needs {HEADER_LEN}", data.len()),
            ));
        }

        let header = parse_header(&data);
        let n = header.n_region as usize;
        let table_end = n
            .checked_mul(SECTION_LEN)
            .and_then(|t| t.checked_add(HEADER_LEN))
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                BringupError::format(
                    IMAGE,
                    format!("{n} section descriptors do not fit in {} bytes", data.len()),
                )
            })?;

        let mut table = &data[HEADER_LEN..table_end];
        let mut sections = Vec::with_capacity(n);
        for index in 0..n {
            let sec_type = table.get_u32();
            let offset = table.get_u32();
            let size = table.get_u32();
            let addr = table.get_u32();
            let info_len = table.get_u32();
            let sec_info = table.get_u32();
            let _align_len = table.get_u32();
            table.advance(SECTION_LEN - 7 * 4);

            let mut section = PatchSection {
                index,
                sec_type,
                addr,
                len: info_len,
                offset,
                sec_info,
                encryption: EncryptionMode::from_sec_info(sec_info),
                payload: Bytes::new(),
            };

            let len = if section.is_downloadable() { info_len } else { size };
            let range = checked_range(|| format!("patch section {index}"), offset, len, data.len())?;
            if section.is_downloadable() {
                section.payload = data.slice(range);
                if let EncryptionMode::Unsupported(t) = section.encryption {
                    tracing::warn!("patch section {index}: unknown encryption type {t:#x}, sending as plain");
                }
            }

            tracing::debug!(
                "patch section {index}: type {sec_type:#x} addr {addr:#010x} len {:#x} at {offset:#x}",
                section.len
            );
            sections.push(section);
        }

        Ok(Self { header, sections })
    }

    /// Header fields.
    pub fn header(&self) -> &PatchHeader {
        &self.header
    }

    /// All sections, in table order.
    pub fn sections(&self) -> &[PatchSection] {
        &self.sections
    }

    /// Sections that are sent to the device.
    pub fn downloadable(&self) -> impl Iterator<Item = &PatchSection> {
        self.sections.iter().filter(|s| s.is_downloadable())
    }
}

fn parse_header(data: &[u8]) -> PatchHeader {
    let word = |at: usize| (&data[at..at + 4]).get_u32();
    PatchHeader {
        build_date: fixed_str(&data[BUILD_DATE_OFFSET..BUILD_DATE_OFFSET + BUILD_DATE_LEN]),
        platform: fixed_str(&data[PLATFORM_OFFSET..PLATFORM_OFFSET + PLATFORM_LEN]),
        hw_sw_ver: word(HW_SW_VER_OFFSET),
        patch_ver: word(PATCH_VER_OFFSET),
        n_region: word(N_REGION_OFFSET),
    }
}

struct PendingSection {
    sec_type: u32,
    addr: u32,
    sec_info: u32,
    data: Bytes,
}

/// Builds patch files: header, section table, then payloads in order.
#[derive(Default)]
pub struct PatchImageBuilder {
    build_date: String,
    platform: String,
    hw_sw_ver: u32,
    patch_ver: u32,
    sections: Vec<PendingSection>,
}

impl PatchImageBuilder {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the build date string.
    #[must_use]
    pub fn build_date(mut self, date: &str) -> Self {
        self.build_date = date.to_string();
        self
    }

    /// Set the platform tag.
    #[must_use]
    pub fn platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    /// Set the version words.
    #[must_use]
    pub fn version(mut self, hw_sw_ver: u32, patch_ver: u32) -> Self {
        self.hw_sw_ver = hw_sw_ver;
        self.patch_ver = patch_ver;
        self
    }

    /// Append a plain downloadable section.
    #[must_use]
    pub fn section(self, addr: u32, data: impl Into<Bytes>) -> Self {
        self.protected_section(addr, SEC_INFO_NOT_SUPPORT, data)
    }

    /// Append a downloadable section with an explicit `sec_key_idx` word.
    #[must_use]
    pub fn protected_section(mut self, addr: u32, sec_info: u32, data: impl Into<Bytes>) -> Self {
        self.sections.push(PendingSection {
            sec_type: SEC_TYPE_INFO,
            addr,
            sec_info,
            data: data.into(),
        });
        self
    }

    /// Append a section of another type, which is never downloaded.
    #[must_use]
    pub fn other_section(mut self, sec_type: u32, data: impl Into<Bytes>) -> Self {
        self.sections.push(PendingSection {
            sec_type,
            addr: 0,
            sec_info: SEC_INFO_NOT_SUPPORT,
            data: data.into(),
        });
        self
    }

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Returns an error if the image would not fit 32-bit offsets.
    pub fn build(self) -> Result<Bytes> {
        let n = u32::try_from(self.sections.len())
            .map_err(|_| BringupError::format(IMAGE, "too many sections"))?;
        let mut out = BytesMut::new();

        out.put_slice(&pad::<BUILD_DATE_LEN>(&self.build_date));
        out.put_slice(&pad::<PLATFORM_LEN>(&self.platform));
        out.put_u32(self.hw_sw_ver);
        out.put_u32(self.patch_ver);
        out.put_bytes(0, N_REGION_OFFSET - out.len());
        out.put_u32(n);
        out.put_bytes(0, HEADER_LEN - out.len());

        let mut offset = HEADER_LEN + self.sections.len() * SECTION_LEN;
        for s in &self.sections {
            let len = wire_len(IMAGE, &s.data)?;
            let offs = u32::try_from(offset)
                .map_err(|_| BringupError::format(IMAGE, "image exceeds 4 GiB"))?;
            out.put_u32(s.sec_type);
            out.put_u32(offs);
            out.put_u32(len);
            out.put_u32(s.addr);
            out.put_u32(len);
            out.put_u32(s.sec_info);
            out.put_u32(0);
            out.put_bytes(0, SECTION_LEN - 7 * 4);
            offset += s.data.len();
        }
        for s in &self.sections {
            out.put_slice(&s.data);
        }
        Ok(out.freeze())
    }
}
