// SPDX-License-Identifier: AGPL-3.0-only

//! Bring-up configuration
//!
//! Defaults come from the variant table. Environment variables override
//! where the firmware is looked up:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `MT7927_FIRMWARE_DIR` | firmware root (default `/lib/firmware`) |
//! | `MT7927_PATCH` | patch file name under the root |
//! | `MT7927_RAM` | RAM file name under the root |

use std::path::PathBuf;

use mt7927_chip::variant::VariantConfig;

use crate::firmware::DirectorySource;

/// Firmware root override.
pub const ENV_FIRMWARE_DIR: &str = "MT7927_FIRMWARE_DIR";
/// Patch name override.
pub const ENV_PATCH: &str = "MT7927_PATCH";
/// RAM name override.
pub const ENV_RAM: &str = "MT7927_RAM";

/// Which firmware to load and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringupConfig {
    /// Root directory for [`DirectorySource`].
    pub firmware_dir: PathBuf,
    /// Patch file name.
    pub patch_name: String,
    /// RAM file name.
    pub ram_name: String,
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self::for_variant(&mt7927_chip::variant::MT7927)
    }
}

impl BringupConfig {
    /// Defaults for `variant`.
    pub fn for_variant(variant: &VariantConfig) -> Self {
        Self {
            firmware_dir: PathBuf::from("/lib/firmware"),
            patch_name: variant.patch_name.to_string(),
            ram_name: variant.ram_name.to_string(),
        }
    }

    /// Defaults for `variant` with environment overrides applied.
    pub fn from_env(variant: &VariantConfig) -> Self {
        Self::for_variant(variant).with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `MT7927_*` names.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_FIRMWARE_DIR) {
            tracing::debug!("{ENV_FIRMWARE_DIR}={dir}");
            self.firmware_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(ENV_PATCH) {
            tracing::debug!("{ENV_PATCH}={name}");
            self.patch_name = name;
        }
        if let Some(name) = lookup(ENV_RAM) {
            tracing::debug!("{ENV_RAM}={name}");
            self.ram_name = name;
        }
        self
    }

    /// Set the firmware root.
    #[must_use]
    pub fn with_firmware_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.firmware_dir = dir.into();
        self
    }

    /// Set the patch file name.
    #[must_use]
    pub fn with_patch(mut self, name: impl Into<String>) -> Self {
        self.patch_name = name.into();
        self
    }

    /// Set the RAM file name.
    #[must_use]
    pub fn with_ram(mut self, name: impl Into<String>) -> Self {
        self.ram_name = name.into();
        self
    }

    /// Directory source rooted at `firmware_dir`.
    pub fn directory_source(&self) -> DirectorySource {
        DirectorySource::new(&self.firmware_dir)
    }
}
