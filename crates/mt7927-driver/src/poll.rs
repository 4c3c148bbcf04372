// SPDX-License-Identifier: AGPL-3.0-only

//! Bounded register polling.
//!
//! One primitive for every wait in the bring-up sequence: read, test, sleep,
//! at most `max_iterations` reads. The worst case is always
//! `(max_iterations - 1) × interval`; there is no wall-clock deadline and no
//! cancellation.

use mt7927_chip::variant::PollSpec;

use crate::clock::Clock;
use crate::error::BringupError;
use crate::outcome::Caveat;
use crate::remap::RegisterShim;

/// Result of a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Predicate held for this value.
    Reached(u32),
    /// Bound exhausted; last value read.
    TimedOut(u32),
}

impl PollOutcome {
    /// Whether the predicate was met.
    pub fn reached(self) -> bool {
        matches!(self, Self::Reached(_))
    }

    /// Value read last, whichever way the poll ended.
    pub fn value(self) -> u32 {
        match self {
            Self::Reached(v) | Self::TimedOut(v) => v,
        }
    }

    /// Turn a timeout into a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::Timeout`] if the poll timed out.
    pub fn or_fatal(self, what: &'static str, register: u32, spec: PollSpec) -> crate::Result<u32> {
        match self {
            Self::Reached(v) => Ok(v),
            Self::TimedOut(last) => Err(BringupError::Timeout {
                what,
                register,
                last,
                iterations: spec.max_iterations.max(1),
            }),
        }
    }

    /// Turn a timeout into a caveat.
    pub fn caveat(self, what: &'static str, register: u32) -> Option<Caveat> {
        match self {
            Self::Reached(_) => None,
            Self::TimedOut(last) => Some(Caveat::PollTimedOut {
                what,
                register,
                last,
            }),
        }
    }
}

/// Poll `addr` until `predicate` holds or `spec.max_iterations` reads are done.
///
/// A match on the first read returns without sleeping. A bound of 0 is
/// treated as a single read.
pub fn poll(
    shim: &RegisterShim,
    clock: &dyn Clock,
    addr: u32,
    predicate: impl Fn(u32) -> bool,
    spec: PollSpec,
) -> PollOutcome {
    let reads = spec.max_iterations.max(1);
    let mut last = 0;

    for i in 0..reads {
        if i > 0 {
            clock.sleep(spec.interval);
        }
        last = shim.read(addr);
        if predicate(last) {
            tracing::trace!("poll {addr:#010x}: {last:#010x} after {} reads", i + 1);
            return PollOutcome::Reached(last);
        }
    }

    tracing::debug!("poll {addr:#010x}: timed out after {reads} reads, last {last:#010x}");
    PollOutcome::TimedOut(last)
}

/// Poll until every bit in `mask` is set.
pub fn poll_set(shim: &RegisterShim, clock: &dyn Clock, addr: u32, mask: u32, spec: PollSpec) -> PollOutcome {
    poll(shim, clock, addr, |v| v & mask == mask, spec)
}

/// Poll until every bit in `mask` is clear.
pub fn poll_clear(shim: &RegisterShim, clock: &dyn Clock, addr: u32, mask: u32, spec: PollSpec) -> PollOutcome {
    poll(shim, clock, addr, |v| v & mask == 0, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::RegisterBus;
    use mt7927_chip::remap::MT7927_MAP;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Returns `values[n]` on the n-th read, repeating the last one.
    struct ScriptBus {
        values: Vec<u32>,
        reads: Arc<AtomicU32>,
    }

    impl RegisterBus for ScriptBus {
        fn read32(&mut self, _offset: u32) -> u32 {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) as usize;
            self.values[n.min(self.values.len() - 1)]
        }

        fn write32(&mut self, _offset: u32, _value: u32) {}
    }

    #[derive(Default)]
    struct CountingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Clock for CountingClock {
        fn sleep(&self, d: Duration) {
            self.sleeps.lock().unwrap().push(d);
        }

        fn yield_now(&self) {}
    }

    fn setup(values: Vec<u32>) -> (RegisterShim, Arc<AtomicU32>) {
        let reads = Arc::new(AtomicU32::new(0));
        let bus = ScriptBus {
            values,
            reads: Arc::clone(&reads),
        };
        (RegisterShim::new(Box::new(bus), MT7927_MAP), reads)
    }

    const SPEC: PollSpec = PollSpec::new(10, Duration::from_millis(1));

    #[test]
    fn first_read_match_does_not_sleep() {
        let (shim, reads) = setup(vec![0x1d1e]);
        let clock = CountingClock::default();
        let out = poll(&shim, &clock, 0x100, |v| v == 0x1d1e, SPEC);
        assert_eq!(out, PollOutcome::Reached(0x1d1e));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn timeout_after_exactly_max_reads() {
        let (shim, reads) = setup(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        let clock = CountingClock::default();
        let out = poll(&shim, &clock, 0x100, |v| v == 0, SPEC);
        assert_eq!(out, PollOutcome::TimedOut(10));
        assert_eq!(reads.load(Ordering::SeqCst), 10);
        assert_eq!(clock.sleeps.lock().unwrap().len(), 9);
    }

    #[test]
    fn reached_mid_way() {
        let (shim, reads) = setup(vec![0, 0, 0x10, 0]);
        let clock = CountingClock::default();
        let out = poll_set(&shim, &clock, 0x100, 0x10, SPEC);
        assert_eq!(out, PollOutcome::Reached(0x10));
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(*clock.sleeps.lock().unwrap(), vec![Duration::from_millis(1); 2]);
    }

    #[test]
    fn zero_bound_reads_once() {
        let (shim, reads) = setup(vec![1]);
        let clock = CountingClock::default();
        let spec = PollSpec::new(0, Duration::from_secs(1));
        assert_eq!(poll_clear(&shim, &clock, 0x100, 1, spec), PollOutcome::TimedOut(1));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn conversions() {
        let out = PollOutcome::TimedOut(7);
        assert!(!out.reached());
        assert_eq!(out.value(), 7);
        assert!(out.caveat("x", 0x10).is_some());
        let err = out.or_fatal("x", 0x10, SPEC).unwrap_err();
        assert!(matches!(err, BringupError::Timeout { iterations: 10, last: 7, .. }));
        assert_eq!(PollOutcome::Reached(3).or_fatal("x", 0x10, SPEC).unwrap(), 3);
    }
}
