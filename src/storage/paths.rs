// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage root location and the few fixed paths derived from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_UPLOAD_DIR;

/// Name prefix of health-check scratch files. Listings hide these.
pub const HEALTH_PROBE_PREFIX: &str = ".health_check-";

/// Storage path utilities for the managed directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_DIR)
    }
}

impl StoragePaths {
    /// Wrap a root directory as given, without touching the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the root directory if missing and pin it to its canonical
    /// absolute form. Safe to call multiple times.
    pub fn create(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self::new(root.canonicalize()?))
    }

    /// Root directory for all managed files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch file used by the write/read/delete health probe.
    pub fn health_probe(&self, probe_id: &str) -> PathBuf {
        self.root.join(format!("{HEALTH_PROBE_PREFIX}{probe_id}"))
    }
}
