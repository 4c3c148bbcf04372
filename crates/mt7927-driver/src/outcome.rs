// SPDX-License-Identifier: AGPL-3.0-only

//! Non-fatal outcomes.
//!
//! A step either fails (`Err(BringupError)`), succeeds cleanly, or succeeds
//! with caveats: a heuristic check timed out or read back something
//! unexpected and the sequence carried on. Caveats are collected so the
//! caller sees exactly which checks were skipped over.

use std::fmt;

/// A non-fatal anomaly observed during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caveat {
    /// A best-effort poll ran out of iterations.
    PollTimedOut {
        /// What was being waited for.
        what: &'static str,
        /// Logical register address.
        register: u32,
        /// Last value read.
        last: u32,
    },
    /// Ownership semaphore still held by the MCU after reset.
    SemaphoreHeld {
        /// Semaphore register value.
        value: u32,
    },
    /// A command whose failure is tolerated could not be sent.
    CommandDropped {
        /// Command name.
        what: &'static str,
        /// Error text.
        reason: String,
    },
    /// Firmware never left the idle state after RAM load.
    FirmwareNotStarted {
        /// Last `ROMCODE_INDEX` value.
        last: u32,
    },
}

impl fmt::Display for Caveat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PollTimedOut {
                what,
                register,
                last,
            } => write!(f, "{what}: timed out, reg {register:#010x} = {last:#010x}"),
            Self::SemaphoreHeld { value } => write!(
                f,
                "semaphore still owned by MCU ({value:#010x}), recovery possibly incomplete"
            ),
            Self::CommandDropped { what, reason } => write!(f, "{what} not sent: {reason}"),
            Self::FirmwareNotStarted { last } => {
                write!(f, "firmware still idle ({last:#010x}), running state assumed")
            }
        }
    }
}

/// Result of a step that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    caveats: Vec<Caveat>,
}

impl Outcome {
    /// Clean outcome.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Record a caveat. Logged at `warn`.
    pub fn degrade(&mut self, caveat: Caveat) {
        tracing::warn!("{caveat}");
        self.caveats.push(caveat);
    }

    /// Fold another step's caveats into this one.
    pub fn absorb(&mut self, other: Outcome) {
        self.caveats.extend(other.caveats);
    }

    /// No caveats recorded.
    pub fn is_ok(&self) -> bool {
        self.caveats.is_empty()
    }

    /// At least one caveat recorded.
    pub fn is_degraded(&self) -> bool {
        !self.caveats.is_empty()
    }

    /// Recorded caveats, in order.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }
}
