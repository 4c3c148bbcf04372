// SPDX-License-Identifier: AGPL-3.0-only

//! MCU command channel.
//!
//! Allocates sequence numbers, builds the TXD and posts the frame, all under
//! one lock, so two senders can never post frames carrying the same number.
//! Nothing here waits for a response: the MT7927 boot ROM does not implement
//! the event half of the mailbox.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use mt7927_chip::mcu::{
    cmd, next_seq, txd0, txd1, HW_TXD_LEN, PKT_TYPE_CMD, PQ_ID_MCU, SET_QUERY_NA, TXD_LEN,
};
use mt7927_chip::regs::field_prep;

use crate::error::{BringupError, Result};
use crate::queue::{HostQueue, QueueId, TxDescriptor, TxFrame};

/// Build the 64-byte MCU TXD for a command carrying `payload_len` bytes.
///
/// # Errors
///
/// Returns an error if the frame does not fit the 16-bit length field.
pub fn build_txd(cid: u8, seq: u8, payload_len: usize) -> Result<BytesMut> {
    let total = TXD_LEN + payload_len;
    let tx_bytes = u16::try_from(total)
        .map_err(|_| BringupError::transfer_failed(format!("command {cid:#04x} too long: {total} bytes")))?;

    let mut txd = BytesMut::with_capacity(total);
    txd.put_u32_le(
        field_prep(txd0::TX_BYTES, u32::from(tx_bytes))
            | field_prep(txd0::PKT_FMT, txd0::PKT_FMT_CMD)
            | field_prep(txd0::Q_IDX, txd0::Q_IDX_MCU),
    );
    txd.put_u32_le(txd1::LONG_FORMAT | field_prep(txd1::HDR_FORMAT, txd1::HDR_FORMAT_CMD));
    txd.put_bytes(0, HW_TXD_LEN - 8);

    // HW_TXD_LEN < TXD_LEN <= total, and total fits u16.
    #[allow(clippy::cast_possible_truncation)]
    txd.put_u16_le((total - HW_TXD_LEN) as u16);
    txd.put_u16_le(PQ_ID_MCU);
    txd.put_u8(cid);
    txd.put_u8(PKT_TYPE_CMD);
    txd.put_u8(SET_QUERY_NA);
    txd.put_u8(seq);
    txd.put_bytes(0, TXD_LEN - txd.len());
    Ok(txd)
}

struct ChannelState {
    queue: Box<dyn HostQueue>,
    seq: u8,
}

/// Fire-and-forget command channel over the WM and FWDL queues.
pub struct McuChannel {
    state: Mutex<ChannelState>,
}

impl std::fmt::Debug for McuChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McuChannel")
            .field("seq", &self.lock().seq)
            .finish_non_exhaustive()
    }
}

impl McuChannel {
    /// Channel over `queue`. The first frame carries sequence number 1.
    pub fn new(queue: Box<dyn HostQueue>) -> Self {
        Self {
            state: Mutex::new(ChannelState { queue, seq: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send command `cid` with `payload` on the WM queue.
    ///
    /// Returns the sequence number used.
    ///
    /// # Errors
    ///
    /// Returns an error if posting the frame fails.
    pub fn send(&self, cid: u8, payload: &[u8]) -> Result<u8> {
        let mut s = self.lock();
        let seq = next_seq(s.seq);
        s.seq = seq;

        let mut frame = build_txd(cid, seq, payload.len())?;
        frame.put_slice(payload);

        let desc = TxDescriptor {
            queue: QueueId::Wm,
            bytes: frame.len(),
            seq,
            cmd: cid,
        };
        tracing::trace!("mcu cmd {cid:#04x} seq {seq} ({} bytes)", desc.bytes);
        s.queue.post_raw(TxFrame {
            desc,
            data: frame.freeze(),
        })?;
        Ok(seq)
    }

    /// Send one raw firmware chunk on the FWDL queue.
    ///
    /// Returns the sequence number consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if posting the frame fails.
    pub fn send_scatter(&self, chunk: Bytes) -> Result<u8> {
        let mut s = self.lock();
        let seq = next_seq(s.seq);
        s.seq = seq;

        let desc = TxDescriptor {
            queue: QueueId::Fwdl,
            bytes: chunk.len(),
            seq,
            cmd: cmd::FW_SCATTER,
        };
        s.queue.post_raw(TxFrame { desc, data: chunk })?;
        Ok(seq)
    }

    /// Reclaim completed descriptors on `queue`.
    pub fn reclaim(&self, queue: QueueId, force: bool) {
        self.lock().queue.reclaim(queue, force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Log {
        frames: Vec<TxFrame>,
        reclaims: Vec<(QueueId, bool)>,
        fail: bool,
    }

    struct LogQueue(Arc<Mutex<Log>>);

    impl HostQueue for LogQueue {
        fn post_raw(&mut self, frame: TxFrame) -> Result<()> {
            let mut log = self.0.lock().unwrap();
            if log.fail {
                return Err(BringupError::transfer_failed("ring full"));
            }
            log.frames.push(frame);
            Ok(())
        }

        fn reclaim(&mut self, queue: QueueId, force: bool) {
            self.0.lock().unwrap().reclaims.push((queue, force));
        }
    }

    fn channel() -> (McuChannel, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        (McuChannel::new(Box::new(LogQueue(Arc::clone(&log)))), log)
    }

    #[test]
    fn txd_layout() {
        let txd = build_txd(cmd::PATCH_START_REQ, 5, 12).unwrap();
        assert_eq!(txd.len(), 64);
        let dw0 = u32::from_le_bytes(txd[0..4].try_into().unwrap());
        assert_eq!(dw0 & 0xffff, 76);
        assert_eq!((dw0 >> 23) & 0x3, 1);
        assert_eq!(dw0 >> 25, 0x20);
        let dw1 = u32::from_le_bytes(txd[4..8].try_into().unwrap());
        assert_eq!(dw1, 0x8001_0000);
        assert!(txd[8..32].iter().all(|&b| b == 0));
        assert_eq!(u16::from_le_bytes([txd[32], txd[33]]), 76 - 32);
        assert_eq!(u16::from_le_bytes([txd[34], txd[35]]), 0x8c00);
        assert_eq!(&txd[36..40], &[cmd::PATCH_START_REQ, 0xa0, 3, 5]);
        assert!(txd[40..].iter().all(|&b| b == 0));
    }

    #[test]
    fn oversized_command_rejected() {
        assert!(build_txd(cmd::TARGET_ADDRESS_LEN_REQ, 1, 70_000).is_err());
    }

    #[test]
    fn commands_and_scatter_share_the_counter() {
        let (ch, log) = channel();
        assert_eq!(ch.send(cmd::TARGET_ADDRESS_LEN_REQ, &[0; 12]).unwrap(), 1);
        assert_eq!(ch.send_scatter(Bytes::from_static(&[1, 2, 3])).unwrap(), 2);
        assert_eq!(ch.send(cmd::PATCH_FINISH_REQ, &[]).unwrap(), 3);

        let log = log.lock().unwrap();
        assert_eq!(log.frames.len(), 3);
        assert_eq!(log.frames[0].desc.queue, QueueId::Wm);
        assert_eq!(log.frames[0].data.len(), 76);
        assert_eq!(&log.frames[0].data[64..], &[0; 12]);
        // Scatter frames go out raw.
        assert_eq!(log.frames[1].desc.queue, QueueId::Fwdl);
        assert_eq!(&log.frames[1].data[..], &[1, 2, 3]);
        assert_eq!(log.frames[1].desc.cmd, cmd::FW_SCATTER);
        assert_eq!(log.frames[2].data.len(), 64);
    }

    #[test]
    fn sequence_wraps_past_zero() {
        let (ch, log) = channel();
        let seqs: Vec<u8> = (0..32)
            .map(|_| ch.send_scatter(Bytes::new()).unwrap())
            .collect();
        assert!(seqs.iter().all(|&s| (1..=15).contains(&s)));
        assert_eq!(seqs[14], 15);
        assert_eq!(seqs[15], 1);
        assert_eq!(log.lock().unwrap().frames.len(), 32);
    }

    #[test]
    fn post_failure_propagates() {
        let (ch, log) = channel();
        log.lock().unwrap().fail = true;
        assert!(matches!(
            ch.send_scatter(Bytes::new()),
            Err(BringupError::TransferFailed { .. })
        ));
    }

    #[test]
    fn reclaim_forwards() {
        let (ch, log) = channel();
        ch.reclaim(QueueId::Fwdl, true);
        assert_eq!(log.lock().unwrap().reclaims, vec![(QueueId::Fwdl, true)]);
    }
}
