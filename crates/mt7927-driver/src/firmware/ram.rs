// SPDX-License-Identifier: AGPL-3.0-only

//! RAM code container (little-endian, described by a trailer).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mt7927_chip::fw::ram::{
    BUILD_DATE_LEN, FEATURE_ENCRY_MODE, FEATURE_KEY_IDX, FEATURE_NON_DL, FEATURE_OVERRIDE_ADDR,
    FEATURE_SET_ENCRYPT, FW_VER_LEN, REGION_LEN, TRAILER_LEN,
};
use mt7927_chip::mcu::dl_mode;
use mt7927_chip::regs::field_prep;

use super::{checked_range, fixed_str, pad, wire_len};
use crate::error::{BringupError, Result};

const IMAGE: &str = "ram";

/// RAM trailer fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamTrailer {
    /// Chip identifier.
    pub chip_id: u8,
    /// ECO revision.
    pub eco_code: u8,
    /// Number of region descriptors.
    pub n_region: u8,
    /// Format version.
    pub format_ver: u8,
    /// Format flags.
    pub format_flag: u8,
    /// Firmware version string.
    pub fw_ver: String,
    /// Build date string.
    pub build_date: String,
    /// Trailer CRC, not verified.
    pub crc: u32,
}

/// One RAM region.
#[derive(Debug, Clone)]
pub struct RamRegion {
    /// Position in the region table.
    pub index: usize,
    /// Load address on the device.
    pub addr: u32,
    /// Payload length.
    pub len: u32,
    /// Feature flags.
    pub feature_set: u8,
    /// Region type byte.
    pub region_type: u8,
    /// Payload offset in the file.
    pub offset: u32,
    /// Payload slice.
    pub payload: Bytes,
}

impl RamRegion {
    /// Whether the region is sent to the device.
    pub fn is_downloadable(&self) -> bool {
        self.feature_set & FEATURE_NON_DL == 0
    }

    /// Whether the region's address replaces the firmware start address.
    pub fn overrides_addr(&self) -> bool {
        self.feature_set & FEATURE_OVERRIDE_ADDR != 0
    }

    /// Download-mode flags for the configure request.
    pub fn dl_mode(&self) -> u32 {
        let mut mode = 0;
        if self.feature_set & FEATURE_SET_ENCRYPT != 0 {
            mode |= dl_mode::ENCRYPT | dl_mode::RESET_SEC_IV;
        }
        if self.feature_set & FEATURE_ENCRY_MODE != 0 {
            mode |= dl_mode::ENCRY_MODE_SEL;
        }
        let key_idx = (self.feature_set & FEATURE_KEY_IDX) >> FEATURE_KEY_IDX.trailing_zeros();
        mode | field_prep(dl_mode::KEY_IDX, u32::from(key_idx))
    }
}

/// A parsed RAM image.
#[derive(Debug, Clone)]
pub struct RamImage {
    trailer: RamTrailer,
    regions: Vec<RamRegion>,
}

impl RamImage {
    /// Parse a RAM file.
    ///
    /// Region descriptors sit immediately before the trailer, region 0
    /// first. Payload offsets run from the start of the file and advance
    /// past every region, downloaded or not.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::Format`] if the trailer or region table does
    /// not fit, or [`BringupError::OutOfBounds`] if any payload lies outside
    /// the file.
    pub fn parse(data: Bytes) -> Result<Self> {
        let trailer_start = data.len().checked_sub(TRAILER_LEN).ok_or_else(|| {
            BringupError::format(
                IMAGE,
                format!("{} bytes, trailer needs {TRAILER_LEN}", data.len()),
            )
        })?;

        let trailer = parse_trailer(&data[trailer_start..]);
        let n = usize::from(trailer.n_region);
        let table_start = trailer_start.checked_sub(n * REGION_LEN).ok_or_else(|| {
            BringupError::format(
                IMAGE,
                format!("{n} region descriptors do not fit before the trailer"),
            )
        })?;

        let mut table = &data[table_start..trailer_start];
        let mut regions = Vec::with_capacity(n);
        let mut offset: u32 = 0;
        for index in 0..n {
            table.advance(12 + 4); // decomp_crc, decomp_len, decomp_blk_sz, rsv
            let addr = table.get_u32_le();
            let len = table.get_u32_le();
            let feature_set = table.get_u8();
            let region_type = table.get_u8();
            table.advance(REGION_LEN - 26);

            let range = checked_range(|| format!("ram region {index}"), offset, len, data.len())?;
            let region = RamRegion {
                index,
                addr,
                len,
                feature_set,
                region_type,
                offset,
                payload: data.slice(range.clone()),
            };
            tracing::debug!(
                "ram region {index}: addr {addr:#010x} len {len:#x} at {offset:#x} features {feature_set:#04x}",
            );
            regions.push(region);

            offset = u32::try_from(range.end)
                .map_err(|_| BringupError::format(IMAGE, "image exceeds 4 GiB"))?;
        }

        Ok(Self { trailer, regions })
    }

    /// Trailer fields.
    pub fn trailer(&self) -> &RamTrailer {
        &self.trailer
    }

    /// All regions, in table order.
    pub fn regions(&self) -> &[RamRegion] {
        &self.regions
    }

    /// Regions that are sent to the device.
    pub fn downloadable(&self) -> impl Iterator<Item = &RamRegion> {
        self.regions.iter().filter(|r| r.is_downloadable())
    }

    /// Address of the last region flagged as the firmware start override.
    pub fn override_addr(&self) -> Option<u32> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.overrides_addr())
            .map(|r| r.addr)
    }
}

fn parse_trailer(mut t: &[u8]) -> RamTrailer {
    let chip_id = t.get_u8();
    let eco_code = t.get_u8();
    let n_region = t.get_u8();
    let format_ver = t.get_u8();
    let format_flag = t.get_u8();
    t.advance(2);
    let fw_ver = fixed_str(&t[..FW_VER_LEN]);
    t.advance(FW_VER_LEN);
    let build_date = fixed_str(&t[..BUILD_DATE_LEN]);
    t.advance(BUILD_DATE_LEN);
    RamTrailer {
        chip_id,
        eco_code,
        n_region,
        format_ver,
        format_flag,
        fw_ver,
        build_date,
        crc: t.get_u32_le(),
    }
}

/// Builds RAM files: payloads back to back, region table, trailer.
#[derive(Default)]
pub struct RamImageBuilder {
    chip_id: u8,
    eco_code: u8,
    fw_ver: String,
    build_date: String,
    regions: Vec<(u32, u8, Bytes)>,
}

impl RamImageBuilder {
    /// Empty image for `chip_id` at ECO `eco_code`.
    pub fn new(chip_id: u8, eco_code: u8) -> Self {
        Self {
            chip_id,
            eco_code,
            ..Self::default()
        }
    }

    /// Set the firmware version string.
    #[must_use]
    pub fn fw_ver(mut self, ver: &str) -> Self {
        self.fw_ver = ver.to_string();
        self
    }

    /// Set the build date string.
    #[must_use]
    pub fn build_date(mut self, date: &str) -> Self {
        self.build_date = date.to_string();
        self
    }

    /// Append a plain region.
    #[must_use]
    pub fn region(self, addr: u32, data: impl Into<Bytes>) -> Self {
        self.region_with_features(addr, 0, data)
    }

    /// Append a region with explicit feature flags.
    #[must_use]
    pub fn region_with_features(mut self, addr: u32, feature_set: u8, data: impl Into<Bytes>) -> Self {
        self.regions.push((addr, feature_set, data.into()));
        self
    }

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Returns an error for more than 255 regions or payloads over 4 GiB.
    pub fn build(self) -> Result<Bytes> {
        let n = u8::try_from(self.regions.len())
            .map_err(|_| BringupError::format(IMAGE, "more than 255 regions"))?;
        let mut out = BytesMut::new();

        for (_, _, data) in &self.regions {
            out.put_slice(data);
        }
        for (addr, features, data) in &self.regions {
            out.put_bytes(0, 16);
            out.put_u32_le(*addr);
            out.put_u32_le(wire_len(IMAGE, data)?);
            out.put_u8(*features);
            out.put_u8(0);
            out.put_bytes(0, REGION_LEN - 26);
        }

        out.put_u8(self.chip_id);
        out.put_u8(self.eco_code);
        out.put_u8(n);
        out.put_u8(1);
        out.put_u8(0);
        out.put_bytes(0, 2);
        out.put_slice(&pad::<FW_VER_LEN>(&self.fw_ver));
        out.put_slice(&pad::<BUILD_DATE_LEN>(&self.build_date));
        out.put_u32_le(0);
        Ok(out.freeze())
    }
}
