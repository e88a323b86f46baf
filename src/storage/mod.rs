// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # File Storage Module
//!
//! All managed files live directly under one storage root. The filesystem
//! is the only source of truth: there is no index, manifest or cache.
//!
//! ## Safety Model
//!
//! - Uploaded names must carry an allow-listed extension and are sanitized
//!   into a single path segment before they are joined onto the root
//! - Every path actually opened, on all three operations, is resolved
//!   and checked to stay strictly inside the root
//! - Download and delete names are not rewritten; they must carry an
//!   allow-listed extension and resolve (after `..` and symlink
//!   resolution) strictly inside the root
//! - Error values never carry host paths
//!
//! ## Concurrency
//!
//! No locking. Concurrent uploads of the same name are last-writer-wins,
//! and a delete racing a read or another delete shows up as `NotFound`.

pub mod file_store;
pub mod paths;
pub mod policy;

pub use file_store::{FileStore, StoreError, StoreResult, StoredFile};
pub use paths::{StoragePaths, HEALTH_PROBE_PREFIX};
pub use policy::{is_allowed_extension, resolve_within, sanitize_filename, ALLOWED_EXTENSIONS};
