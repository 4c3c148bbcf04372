// SPDX-License-Identifier: AGPL-3.0-only

//! Raw BAR0 register access.
//!
//! [`RegisterBus`] is the one seam between the bring-up logic and the
//! hardware: 32-bit reads and writes at BAR0 offsets, nothing else. Address
//! translation happens above it in [`crate::RegisterShim`].
//!
//! [`MmioBus`] maps `/sys/bus/pci/devices/{addr}/resource0` with rustix.
//! The simulator in [`crate::sim`] provides the other implementation.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{BringupError, Result};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// 32-bit register access at BAR0 offsets.
pub trait RegisterBus: Send {
    /// Read the register at `offset`.
    fn read32(&mut self, offset: u32) -> u32;

    /// Write `value` to the register at `offset`.
    fn write32(&mut self, offset: u32, value: u32);
}

/// BAR0 mapped through sysfs.
#[derive(Debug)]
pub struct MmioBus {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    pcie_address: String,
}

// SAFETY: Send - MmioBus owns the mapping exclusively. Moving it between
// threads doesn't invalidate the mapping (mmap'd memory is process-wide).
unsafe impl Send for MmioBus {}

impl MmioBus {
    /// Map BAR `bar_index` of the device at `pcie_address`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Resource file doesn't exist or cannot be opened read/write
    /// - BAR size is 0 (device disabled)
    /// - mmap fails
    pub fn open(pcie_address: &str, bar_index: usize) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/resource{bar_index}");

        tracing::debug!("Mapping PCIe BAR: {path}");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| BringupError::map_failed(&path, format!("{e}. Is the device enabled?")))?;

        // Truncation acceptable: BAR sizes fit in usize on 64-bit (our only target)
        #[allow(clippy::cast_possible_truncation)]
        let size = file
            .metadata()
            .map_err(|e| BringupError::map_failed(&path, format!("cannot stat: {e}")))?
            .len() as usize;

        if size == 0 {
            return Err(BringupError::map_failed(&path, "BAR size is 0"));
        }

        // SAFETY: mmap of a PCI resource file.
        // - File descriptor is valid (just opened read/write)
        // - Size is non-zero and equals the resource length
        // - MAP_SHARED so writes reach the device
        // - File is stored in the struct so the fd outlives the mapping
        // - Drop unmaps exactly this range
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| BringupError::map_failed(&path, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| BringupError::map_failed(&path, "mmap returned null"))?;

        tracing::info!(
            "Mapped BAR{bar_index} for {pcie_address} ({} KB at {ptr:p})",
            size / 1024,
        );

        Ok(Self {
            ptr,
            size,
            _file: file,
            pcie_address: pcie_address.to_string(),
        })
    }

    /// PCIe address this bus was opened for.
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    fn in_bounds(&self, offset: u32) -> bool {
        (offset as usize)
            .checked_add(4)
            .is_some_and(|end| end <= self.size)
            && offset % 4 == 0
    }
}

impl RegisterBus for MmioBus {
    fn read32(&mut self, offset: u32) -> u32 {
        if !self.in_bounds(offset) {
            // What a master abort would return.
            tracing::warn!("BAR read out of range: {offset:#x} (limit {:#x})", self.size);
            return u32::MAX;
        }

        // SAFETY: Volatile read from a mapped device register.
        // - Bounds and 4-byte alignment checked above
        // - ptr is valid for size bytes (successful mmap, kept until Drop)
        // - read_volatile: MMIO reads have side effects and must not be elided
        let value = unsafe {
            self.ptr
                .as_ptr()
                .add(offset as usize)
                .cast::<u32>()
                .read_volatile()
        };

        tracing::trace!("rd {offset:#08x} = {value:#010x}");
        value
    }

    fn write32(&mut self, offset: u32, value: u32) {
        if !self.in_bounds(offset) {
            tracing::warn!("BAR write out of range dropped: {offset:#x} = {value:#010x}");
            return;
        }

        tracing::trace!("wr {offset:#08x} = {value:#010x}");

        // SAFETY: Volatile write to a mapped device register.
        // - Bounds and 4-byte alignment checked above
        // - ptr is valid for size bytes (successful mmap, kept until Drop)
        // - write_volatile: MMIO writes trigger hardware actions and must not be reordered
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset as usize)
                .cast::<u32>()
                .write_volatile(value);
        }
    }
}

impl Drop for MmioBus {
    fn drop(&mut self) {
        // SAFETY: ptr and size are exactly what mmap returned; nothing else
        // references the mapping once the bus is dropped.
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.size) } {
            tracing::error!("munmap failed for {}: {e}", self.pcie_address);
        }
    }
}
