// SPDX-License-Identifier: AGPL-3.0-only

//! `MTK-` bundles: several firmware files packed behind one index.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mt7927_chip::fw::bundle::{DATE_LEN, ENTRY_LEN, HEADER_LEN, MAGIC, NAME_LEN, UNK1};

use super::{checked_range, fixed_str, pad, wire_len};
use crate::error::{BringupError, Result};

const IMAGE: &str = "bundle";

/// One packed file.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// File name as recorded in the index.
    pub name: String,
    /// Date string.
    pub date: String,
    /// Offset in the bundle.
    pub offset: u32,
    /// File contents.
    pub data: Bytes,
}

/// A parsed bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    entries: Vec<BundleEntry>,
}

impl Bundle {
    /// Parse a bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic is wrong, the index is truncated, or an
    /// entry lies outside the file. Odd header values are only logged.
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(BringupError::format(IMAGE, "missing MTK- magic"));
        }

        let mut hdr = &data[4..HEADER_LEN];
        let n_items = usize::from(hdr.get_u16_le());
        let unk1 = hdr.get_u16_le();
        let file_size = hdr.get_u32_le();
        let zero = hdr.get_u32_le();

        if unk1 != UNK1 {
            tracing::warn!("bundle: unexpected unk1 {unk1:#06x}");
        }
        if file_size as usize != data.len() {
            tracing::warn!("bundle: header says {file_size} bytes, file has {}", data.len());
        }
        if zero != 0 {
            tracing::warn!("bundle: reserved header word is {zero:#010x}");
        }

        let index_end = HEADER_LEN + n_items * ENTRY_LEN;
        if index_end > data.len() {
            return Err(BringupError::format(
                IMAGE,
                format!("{n_items} entries do not fit in {} bytes", data.len()),
            ));
        }

        let mut index = &data[HEADER_LEN..index_end];
        let mut entries = Vec::with_capacity(n_items);
        for i in 0..n_items {
            let name = fixed_str(&index[..NAME_LEN]);
            index.advance(NAME_LEN);
            let date = fixed_str(&index[..DATE_LEN]);
            index.advance(DATE_LEN);
            let offset = index.get_u32_le();
            let size = index.get_u32_le();
            let zero = index.get_u32_le();
            if zero != 0 {
                tracing::warn!("bundle entry {i} ({name}): reserved word is {zero:#010x}");
            }

            let range = checked_range(|| format!("bundle entry {name}"), offset, size, data.len())?;
            tracing::debug!("bundle entry {i}: {name} ({size} bytes at {offset:#x})");
            entries.push(BundleEntry {
                name,
                date,
                offset,
                data: data.slice(range),
            });
        }

        Ok(Self { entries })
    }

    /// All entries, in index order.
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// Entry whose name is `name`, or whose name ends in `/name`.
    pub fn get(&self, name: &str) -> Option<&BundleEntry> {
        self.entries.iter().find(|e| e.name == name).or_else(|| {
            let base = name.rsplit('/').next().unwrap_or(name);
            self.entries
                .iter()
                .find(|e| e.name.rsplit('/').next() == Some(base))
        })
    }
}

/// Builds bundles.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    entries: Vec<(String, String, Bytes)>,
}

impl BundleBuilder {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file.
    #[must_use]
    pub fn entry(mut self, name: &str, date: &str, data: impl Into<Bytes>) -> Self {
        self.entries.push((name.to_string(), date.to_string(), data.into()));
        self
    }

    /// Serialize: header, index, then files in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle would not fit its 16/32-bit fields.
    pub fn build(self) -> Result<Bytes> {
        let n = u16::try_from(self.entries.len())
            .map_err(|_| BringupError::format(IMAGE, "too many entries"))?;
        let payload: usize = self.entries.iter().map(|(_, _, d)| d.len()).sum();
        let total = HEADER_LEN + self.entries.len() * ENTRY_LEN + payload;
        let as_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| BringupError::format(IMAGE, "bundle exceeds 4 GiB"))
        };

        let mut out = BytesMut::with_capacity(total);
        out.put_slice(MAGIC);
        out.put_u16_le(n);
        out.put_u16_le(UNK1);
        out.put_u32_le(as_u32(total)?);
        out.put_u32_le(0);

        let mut offset = HEADER_LEN + self.entries.len() * ENTRY_LEN;
        for (name, date, data) in &self.entries {
            out.put_slice(&pad::<NAME_LEN>(name));
            out.put_slice(&pad::<DATE_LEN>(date));
            out.put_u32_le(as_u32(offset)?);
            out.put_u32_le(wire_len(IMAGE, data)?);
            out.put_u32_le(0);
            offset += data.len();
        }
        for (_, _, data) in &self.entries {
            out.put_slice(data);
        }
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bytes {
        BundleBuilder::new()
            .entry("mediatek/mt6639/PATCH.bin", "20240315", vec![1u8; 10])
            .entry("RAM.bin", "20240316", vec![2u8; 3])
            .build()
            .unwrap()
    }

    #[test]
    fn entries_and_lookup() {
        let raw = sample();
        assert_eq!(raw.len(), HEADER_LEN + 2 * ENTRY_LEN + 13);

        let b = Bundle::parse(raw).unwrap();
        assert_eq!(b.entries().len(), 2);
        assert_eq!(b.entries()[1].date, "20240316");
        assert_eq!(&b.get("RAM.bin").unwrap().data[..], &[2, 2, 2]);
        // Lookup falls back to the base name on either side.
        assert_eq!(b.get("PATCH.bin").unwrap().data.len(), 10);
        assert_eq!(b.get("other/dir/RAM.bin").unwrap().data.len(), 3);
        assert!(b.get("missing.bin").is_none());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut raw = sample().to_vec();
        raw[0] = b'X';
        assert!(matches!(
            Bundle::parse(Bytes::from(raw)).unwrap_err(),
            BringupError::Format { image: "bundle", .. }
        ));
    }

    #[test]
    fn entry_out_of_bounds_rejected() {
        let mut raw = sample().to_vec();
        // Second entry's size field.
        let at = HEADER_LEN + ENTRY_LEN + NAME_LEN + DATE_LEN + 4;
        raw[at..at + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            Bundle::parse(Bytes::from(raw)).unwrap_err(),
            BringupError::OutOfBounds { len: 1000, .. }
        ));
    }

    #[test]
    fn odd_header_values_only_warn() {
        let mut raw = sample().to_vec();
        raw[6] = 7;
        raw[8] = 0;
        raw[12] = 1;
        assert_eq!(Bundle::parse(Bytes::from(raw)).unwrap().entries().len(), 2);
    }
}
