// SPDX-License-Identifier: AGPL-3.0-only

//! Injectable sleep/yield.

use std::time::Duration;

/// Blocking delays used by every wait in the bring-up sequence.
pub trait Clock: Send + Sync {
    /// Block for at least `duration`.
    fn sleep(&self, duration: Duration);

    /// Give up the CPU voluntarily.
    fn yield_now(&self);
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}
