// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for MT7927 bring-up

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bring-up operations
pub type Result<T> = std::result::Result<T, BringupError>;

/// Errors that abort a bring-up step
///
/// Anything recoverable is reported as a [`crate::Caveat`] instead.
#[derive(Debug, Error)]
pub enum BringupError {
    /// Firmware file could not be found by the firmware source
    #[error("Firmware not found: {name}")]
    FirmwareNotFound {
        /// Name that was requested
        name: String,
    },

    /// I/O error while reading firmware or mapping the device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Device BAR could not be opened or mapped
    #[error("Cannot map {path}: {reason}")]
    MapFailed {
        /// sysfs resource path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Malformed firmware container
    #[error("Bad {image} image: {reason}")]
    Format {
        /// Which container ("patch", "ram", "bundle")
        image: &'static str,
        /// What was wrong
        reason: String,
    },

    /// A section, region or entry points outside its buffer
    #[error("{what} out of bounds: offset {offset:#x} + len {len:#x} exceeds {limit:#x}")]
    OutOfBounds {
        /// Which record
        what: String,
        /// Start offset
        offset: u64,
        /// Length
        len: u64,
        /// Buffer length
        limit: u64,
    },

    /// Posting a frame to a host queue failed
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure
        reason: String,
    },

    /// A fatal poll ran out of iterations
    #[error("Timeout waiting for {what}: reg {register:#010x} = {last:#010x} after {iterations} reads")]
    Timeout {
        /// What was being waited for
        what: &'static str,
        /// Logical register address
        register: u32,
        /// Last value read
        last: u32,
        /// Reads performed
        iterations: u32,
    },

    /// MCU status or ROM index shows a dead MCU
    #[error("MCU crashed: status {status:#010x}")]
    McuCrashed {
        /// Value read from the status register
        status: u32,
    },

    /// Device in a state the requested operation cannot start from
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },
}

impl BringupError {
    /// Create a firmware not found error
    pub fn firmware_not_found(name: impl Into<String>) -> Self {
        Self::FirmwareNotFound { name: name.into() }
    }

    /// Create a map failed error
    pub fn map_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MapFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a format error
    pub fn format(image: &'static str, reason: impl Into<String>) -> Self {
        Self::Format {
            image,
            reason: reason.into(),
        }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(what: impl Into<String>, offset: u64, len: u64, limit: u64) -> Self {
        Self::OutOfBounds {
            what: what.into(),
            offset,
            len,
            limit,
        }
    }

    /// Create a transfer failed error
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Whether the MCU is gone and only `recover` can help
    pub fn is_crash(&self) -> bool {
        matches!(self, Self::McuCrashed { .. })
    }

    /// Whether the firmware container itself is bad (retrying will not help)
    pub fn is_firmware_fault(&self) -> bool {
        matches!(
            self,
            Self::FirmwareNotFound { .. } | Self::Format { .. } | Self::OutOfBounds { .. }
        )
    }
}
