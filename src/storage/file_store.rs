// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The four file operations (list, save, read, delete) over the storage
//! root, each gated by the filename policy in [`super::policy`].
//!
//! Every call is plain blocking `std::fs` I/O with no state kept between
//! calls. Async callers should run these on a blocking thread.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::policy::{is_allowed_extension, resolve_within, sanitize_filename};
use super::{StoragePaths, HEALTH_PROBE_PREFIX};

/// Error type for file store operations.
///
/// Messages never include host paths, so they are safe to log and to
/// surface to clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No filename supplied, or nothing usable left after sanitizing.
    #[error("No filename supplied")]
    EmptyName,

    /// Extension absent or not in the allow-list.
    #[error("File type not allowed")]
    DisallowedType,

    /// Name resolves outside the storage root.
    #[error("Filename resolves outside the storage root")]
    PathEscape,

    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Target file absent at operation time.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other filesystem failure (permissions, disk full, ...).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for file store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// File contents returned by [`FileStore::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Final path segment of the resolved file, suitable for an
    /// attachment filename.
    pub name: String,
    pub content: Vec<u8>,
}

/// Stateless façade over the storage root.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StoragePaths,
}

impl FileStore {
    /// Wrap an existing storage root. The root should already be absolute
    /// and canonical; use [`FileStore::open`] otherwise.
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Create the storage root if absent and open a store over it.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let paths = StoragePaths::create(root)?;
        tracing::info!(root = %paths.root().display(), "File store ready");
        Ok(Self::new(paths))
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Names of the regular files directly inside the root.
    ///
    /// Order is whatever the filesystem yields. Subdirectories, non-UTF-8
    /// names and in-flight health-check files are skipped.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.paths.root())? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if name.starts_with(HEALTH_PROBE_PREFIX) => {}
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(name = ?raw, "Skipping non UTF-8 filename"),
            }
        }
        Ok(names)
    }

    /// Store `content` under the sanitized form of `raw_name`.
    ///
    /// An existing file with the same sanitized name is overwritten
    /// (last writer wins). Returns the name actually used, which may
    /// differ from `raw_name`.
    pub fn save(&self, raw_name: &str, content: &[u8], max_size: usize) -> StoreResult<String> {
        if raw_name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if !is_allowed_extension(raw_name) {
            tracing::warn!(filename = raw_name, "Rejected upload with disallowed type");
            return Err(StoreError::DisallowedType);
        }

        let safe_name = sanitize_filename(raw_name);
        if safe_name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        // Sanitizing can eat the extension (e.g. a fully non-ASCII stem).
        if !is_allowed_extension(&safe_name) {
            tracing::warn!(
                filename = raw_name,
                sanitized = %safe_name,
                "Sanitized upload name lost its allowed extension"
            );
            return Err(StoreError::DisallowedType);
        }

        if content.len() > max_size {
            return Err(StoreError::PayloadTooLarge {
                size: content.len(),
                limit: max_size,
            });
        }

        // A single segment cannot traverse, but an existing symlink can.
        let path = resolve_within(self.paths.root(), &safe_name)?;
        write_file(&path, content)?;

        tracing::info!(filename = %safe_name, size = content.len(), "File uploaded");
        Ok(safe_name)
    }

    /// Read the full contents of `name`. The name is validated, never
    /// rewritten.
    pub fn read(&self, name: &str) -> StoreResult<StoredFile> {
        let path = self.checked_path(name)?;
        ensure_regular_file(&path, name)?;

        let content = fs::read(&path).map_err(|e| not_found_or_io(e, name))?;
        let name = display_name(&path, name);
        tracing::debug!(filename = %name, size = content.len(), "File read");
        Ok(StoredFile { name, content })
    }

    /// Remove `name`. A file that vanishes between the existence check and
    /// the unlink is reported as `NotFound`.
    pub fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.checked_path(name)?;
        ensure_regular_file(&path, name)?;

        fs::remove_file(&path).map_err(|e| not_found_or_io(e, name))?;
        tracing::info!(filename = name, "File deleted");
        Ok(())
    }

    /// Verify the root is writable with a write/read/delete round trip.
    pub fn health_check(&self) -> StoreResult<()> {
        let probe = self.paths.health_probe(&uuid::Uuid::new_v4().to_string());
        let data = b"health_check_data";

        write_file(&probe, data)?;
        let read_back = fs::read(&probe);
        fs::remove_file(&probe)?;

        if read_back? != data {
            return Err(StoreError::Io(io::Error::other(
                "health check data mismatch",
            )));
        }
        Ok(())
    }

    /// Allow-list first, then containment. Both must pass.
    fn checked_path(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if !is_allowed_extension(name) {
            tracing::warn!(filename = name, "Rejected access with disallowed type");
            return Err(StoreError::DisallowedType);
        }
        resolve_within(self.paths.root(), name).inspect_err(|e| {
            if matches!(e, StoreError::PathEscape) {
                tracing::warn!(filename = name, "Rejected path escaping the storage root");
            }
        })
    }
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.flush()
}

fn ensure_regular_file(path: &Path, name: &str) -> StoreResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StoreError::NotFound(name.to_string())),
        Err(e) => Err(not_found_or_io(e, name)),
    }
}

fn not_found_or_io(e: io::Error, name: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(e)
    }
}

fn display_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    const MAX: usize = 1024;

    fn test_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[test]
    fn open_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_then_read_round_trips_bytes() {
        let (_dir, store) = test_store();
        let body = b"%PDF-1.7\n\x00\x01\x02binary".to_vec();

        let saved = store.save("report.pdf", &body, MAX).unwrap();
        assert_eq!(saved, "report.pdf");

        let file = store.read("report.pdf").unwrap();
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.content, body);
    }

    #[test]
    fn save_returns_sanitized_name() {
        let (_dir, store) = test_store();
        let saved = store.save("../../My Notes.txt", b"hi", MAX).unwrap();
        assert_eq!(saved, "My_Notes.txt");
        assert_eq!(store.read("My_Notes.txt").unwrap().content, b"hi");
    }

    #[test]
    fn save_overwrites_existing_file() {
        let (_dir, store) = test_store();
        store.save("a.txt", b"first", MAX).unwrap();
        store.save("a.txt", b"second", MAX).unwrap();

        assert_eq!(store.read("a.txt").unwrap().content, b"second");
        assert_eq!(store.list().unwrap(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn save_rejects_empty_and_disallowed_names() {
        let (_dir, store) = test_store();
        assert!(matches!(store.save("", b"x", MAX), Err(StoreError::EmptyName)));
        assert!(matches!(
            store.save("virus.exe", b"x", MAX),
            Err(StoreError::DisallowedType)
        ));
        assert!(matches!(
            store.save("noext", b"x", MAX),
            Err(StoreError::DisallowedType)
        ));
        assert!(matches!(store.save("...txt", b"x", MAX), Err(StoreError::DisallowedType)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_rejects_names_that_lose_their_extension() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.save("файл.txt", b"x", MAX),
            Err(StoreError::DisallowedType)
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn size_limit_is_inclusive() {
        let (_dir, store) = test_store();
        let exact = vec![b'a'; MAX];
        let over = vec![b'a'; MAX + 1];

        assert!(store.save("exact.txt", &exact, MAX).is_ok());
        assert!(matches!(
            store.save("over.txt", &over, MAX),
            Err(StoreError::PayloadTooLarge { size, limit }) if size == MAX + 1 && limit == MAX
        ));
        assert_eq!(store.list().unwrap(), vec!["exact.txt".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn save_does_not_write_through_escaping_symlink() {
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("victim.txt");
        fs::write(&target, b"original").unwrap();

        let (_dir, store) = test_store();
        std::os::unix::fs::symlink(&target, store.paths().root().join("victim.txt")).unwrap();

        assert!(matches!(
            store.save("victim.txt", b"overwritten", MAX),
            Err(StoreError::PathEscape)
        ));
        assert_eq!(fs::read(&target).unwrap(), b"original");
    }

    #[cfg(unix)]
    #[test]
    fn save_does_not_create_through_dangling_symlink() {
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("planted.txt");

        let (_dir, store) = test_store();
        std::os::unix::fs::symlink(&target, store.paths().root().join("planted.txt")).unwrap();

        assert!(matches!(
            store.save("planted.txt", b"payload", MAX),
            Err(StoreError::PathEscape)
        ));
        assert!(!target.exists());
    }

    #[test]
    fn list_contains_each_saved_name_once() {
        let (_dir, store) = test_store();
        store.save("a.txt", b"a", MAX).unwrap();
        store.save("b.txt", b"b", MAX).unwrap();
        fs::create_dir(store.paths().root().join("subdir")).unwrap();

        let names = store.list().unwrap();
        assert_eq!(names.len(), 2);
        let set: HashSet<_> = names.into_iter().collect();
        assert_eq!(
            set,
            HashSet::from(["a.txt".to_string(), "b.txt".to_string()])
        );
    }

    #[test]
    fn list_hides_in_flight_health_check_files() {
        let (_dir, store) = test_store();
        fs::write(store.paths().health_probe("inflight"), b"ok").unwrap();
        assert!(store.list().unwrap().is_empty());

        store.save("visible.txt", b"v", MAX).unwrap();
        assert_eq!(store.list().unwrap(), vec!["visible.txt".to_string()]);
    }

    #[test]
    fn read_validates_type_before_containment() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.read("../../etc/passwd"),
            Err(StoreError::DisallowedType)
        ));
        assert!(matches!(
            store.read("../outside.txt"),
            Err(StoreError::PathEscape)
        ));
        assert!(matches!(store.read(""), Err(StoreError::EmptyName)));
    }

    #[test]
    fn read_never_returns_files_outside_root() {
        let parent = TempDir::new().unwrap();
        fs::write(parent.path().join("secret.txt"), b"top secret").unwrap();
        let store = FileStore::open(parent.path().join("uploads")).unwrap();

        assert!(matches!(
            store.read("../secret.txt"),
            Err(StoreError::PathEscape)
        ));
        assert!(matches!(
            store.delete("../secret.txt"),
            Err(StoreError::PathEscape)
        ));
        assert!(parent.path().join("secret.txt").exists());
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.read("ghost.txt"),
            Err(StoreError::NotFound(name)) if name == "ghost.txt"
        ));
    }

    #[test]
    fn directories_are_not_files() {
        let (_dir, store) = test_store();
        fs::create_dir(store.paths().root().join("folder.txt")).unwrap();
        assert!(matches!(store.read("folder.txt"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("folder.txt"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, store) = test_store();
        store.save("x.txt", b"x", MAX).unwrap();
        store.delete("x.txt").unwrap();

        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.read("x.txt"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_missing_file_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(store.delete("x.txt"), Err(StoreError::NotFound(_))));
        // Repeating is just as harmless.
        assert!(matches!(store.delete("x.txt"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_rejects_disallowed_type() {
        let (_dir, store) = test_store();
        fs::write(store.paths().root().join("keep.exe"), b"x").unwrap();
        assert!(matches!(
            store.delete("keep.exe"),
            Err(StoreError::DisallowedType)
        ));
        assert!(store.paths().root().join("keep.exe").exists());
    }

    #[test]
    fn health_check_leaves_no_trace() {
        let (_dir, store) = test_store();
        store.health_check().expect("health check should pass");
        assert!(fs::read_dir(store.paths().root()).unwrap().next().is_none());
    }

    #[test]
    fn errors_do_not_leak_paths() {
        let (dir, store) = test_store();
        let root = dir.path().to_string_lossy().to_string();
        for err in [
            store.read("../x.txt").unwrap_err(),
            store.read("ghost.txt").unwrap_err(),
            store.save("a.exe", b"", MAX).unwrap_err(),
        ] {
            assert!(!err.to_string().contains(&root), "{err}");
        }
    }
}
