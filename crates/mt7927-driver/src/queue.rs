// SPDX-License-Identifier: AGPL-3.0-only

//! Host DMA queues, as consumed by the bring-up sequence.
//!
//! Ring allocation, descriptor memory and completion interrupts belong to
//! the host framework. Bring-up only needs to post a fully built frame and
//! to reclaim completed descriptors by hand, because the boot ROM never
//! raises a completion interrupt.

use bytes::Bytes;

use crate::error::Result;

/// MCU queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueId {
    /// Command queue (`MT_MCUQ_WM`).
    Wm,
    /// Firmware-download queue (`MT_MCUQ_FWDL`).
    Fwdl,
}

/// Metadata of one outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDescriptor {
    /// Destination queue.
    pub queue: QueueId,
    /// Frame length in bytes, TXD included.
    pub bytes: usize,
    /// Sequence number, 1..=15.
    pub seq: u8,
    /// MCU command ID.
    pub cmd: u8,
}

/// A frame ready to be placed on a ring.
#[derive(Debug, Clone)]
pub struct TxFrame {
    /// Descriptor metadata.
    pub desc: TxDescriptor,
    /// Wire bytes.
    pub data: Bytes,
}

/// Host-framework queue primitives.
pub trait HostQueue: Send {
    /// Enqueue `frame` on `frame.desc.queue` and kick the ring.
    ///
    /// # Errors
    ///
    /// Returns an error if the ring is full or the DMA mapping fails.
    fn post_raw(&mut self, frame: TxFrame) -> Result<()>;

    /// Free completed descriptors on `queue`. `force` frees everything
    /// regardless of the hardware's completion index.
    fn reclaim(&mut self, queue: QueueId, force: bool);
}
