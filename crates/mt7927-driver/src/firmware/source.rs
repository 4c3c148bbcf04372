// SPDX-License-Identifier: AGPL-3.0-only

//! Where firmware files come from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::Bundle;
use crate::error::{BringupError, Result};

/// Loads firmware files by name.
pub trait FirmwareSource: Send + Sync {
    /// Load the file `name`, e.g. `mediatek/mt6639/WIFI_RAM_CODE_MT6639_2_1.bin`.
    ///
    /// # Errors
    ///
    /// Returns [`BringupError::FirmwareNotFound`] if there is no such file.
    fn load(&self, name: &str) -> Result<Bytes>;
}

/// Files under a root directory, `/lib/firmware` by default.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl Default for DirectorySource {
    fn default() -> Self {
        Self::new("/lib/firmware")
    }
}

impl DirectorySource {
    /// Source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FirmwareSource for DirectorySource {
    fn load(&self, name: &str) -> Result<Bytes> {
        let rel = Path::new(name);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(BringupError::firmware_not_found(name));
        }

        let path = self.root.join(rel);
        tracing::debug!("loading firmware {}", path.display());
        match std::fs::read(&path) {
            Ok(data) => {
                tracing::info!("Loaded {name} ({} bytes)", data.len());
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BringupError::firmware_not_found(name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory files.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Bytes>,
}

impl MemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `data` under `name`.
    #[must_use]
    pub fn with(mut self, name: &str, data: impl Into<Bytes>) -> Self {
        self.insert(name, data);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, name: &str, data: impl Into<Bytes>) {
        self.files.insert(name.to_string(), data.into());
    }
}

impl FirmwareSource for MemorySource {
    fn load(&self, name: &str) -> Result<Bytes> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| BringupError::firmware_not_found(name))
    }
}

/// Files packed in an `MTK-` bundle, matched by base name.
#[derive(Debug, Clone)]
pub struct BundleSource {
    bundle: Bundle,
}

impl BundleSource {
    /// Source over a parsed bundle.
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }

    /// Parse `data` as a bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid bundle.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        Bundle::parse(data).map(Self::new)
    }
}

impl FirmwareSource for BundleSource {
    fn load(&self, name: &str) -> Result<Bytes> {
        self.bundle
            .get(name)
            .map(|e| e.data.clone())
            .ok_or_else(|| BringupError::firmware_not_found(name))
    }
}
