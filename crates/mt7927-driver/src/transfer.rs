// SPDX-License-Identifier: AGPL-3.0-only

//! Chunked firmware transfer
//!
//! One section or region goes out as a configure request followed by raw
//! scatter chunks on the FWDL queue. The boot ROM acknowledges nothing, so
//! the host frees descriptors itself and samples `MCU_STATUS` to notice a
//! crash. A live status word only means the MCU is still answering, not
//! that it accepted the data.

use bytes::{BufMut, Bytes, BytesMut};
use mt7927_chip::mcu::{cmd, config_cmd};
use mt7927_chip::regs::{self, glo_cfg};

use crate::device::Device;
use crate::error::{BringupError, Result};
use crate::queue::QueueId;

/// What one `send_section` call sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionReport {
    /// Destination address.
    pub addr: u32,
    /// Bytes sent.
    pub len: u32,
    /// Download mode in the configure request.
    pub mode: u32,
    /// Configure command used.
    pub config_cmd: u8,
    /// Scatter chunks posted.
    pub chunks: usize,
    /// `MCU_STATUS` after the last chunk.
    pub status: u32,
}

/// Send `len` bytes of `payload` to device address `addr`.
///
/// # Errors
///
/// - [`BringupError::OutOfBounds`] if `payload` is shorter than `len`
/// - [`BringupError::TransferFailed`] if a frame could not be posted
/// - [`BringupError::McuCrashed`] if `MCU_STATUS` reads 0 or all-ones at a
///   checkpoint; remaining chunks are not sent
pub fn send_section(
    dev: &mut Device,
    payload: &Bytes,
    addr: u32,
    len: u32,
    mode: u32,
    is_patch: bool,
) -> Result<SectionReport> {
    let v = dev.variant();
    let total = len as usize;
    if total > payload.len() {
        return Err(BringupError::out_of_bounds(
            format!("section at {addr:#010x}"),
            0,
            u64::from(len),
            payload.len() as u64,
        ));
    }

    // Configure.
    let cid = config_cmd(addr, is_patch);
    let mut req = BytesMut::with_capacity(12);
    req.put_u32_le(addr);
    req.put_u32_le(len);
    req.put_u32_le(mode);
    tracing::info!("download {addr:#010x} len {len:#x} mode {mode:#x} cmd {cid:#04x}");
    dev.mcu().send(cid, &req)?;
    dev.sleep(v.delays.config_settle);

    // Transfer mode.
    let glo = dev.rr(regs::WFDMA0_GLO_CFG);
    if glo & glo_cfg::FW_DWLD_BYPASS_DMASHDL == 0 {
        dev.set(regs::WFDMA0_GLO_CFG, glo_cfg::FW_DWLD_BYPASS_DMASHDL);
        tracing::debug!("firmware download bypass enabled");
    }

    // Scatter.
    let n_chunks = total.div_ceil(v.chunk_size);
    let mut sent = 0;
    for (i, start) in (0..total).step_by(v.chunk_size).enumerate() {
        let end = (start + v.chunk_size).min(total);
        dev.mcu().reclaim(QueueId::Fwdl, true);
        dev.mcu()
            .send_scatter(payload.slice(start..end))
            .inspect_err(|e| tracing::error!("chunk {i}/{n_chunks} at {addr:#010x}: {e}"))?;
        sent += 1;

        if sent % v.yield_every == 0 {
            dev.mcu().reclaim(QueueId::Fwdl, true);
            dev.yield_now();
            dev.check_alive().inspect_err(|_| {
                tracing::error!("aborting {addr:#010x} after chunk {}/{n_chunks}", i + 1);
            })?;
        }
    }

    // Verify.
    let status = dev.check_alive()?;
    tracing::debug!("{addr:#010x}: {sent} chunks sent, MCU_STATUS {status:#010x}");

    Ok(SectionReport {
        addr,
        len,
        mode,
        config_cmd: cid,
        chunks: sent,
        status,
    })
}

/// `PATCH_FINISH_REQ` with an empty body.
///
/// # Errors
///
/// Returns an error if the frame could not be posted.
pub fn patch_finish(dev: &Device) -> Result<u8> {
    dev.mcu().send(cmd::PATCH_FINISH_REQ, &[])
}
