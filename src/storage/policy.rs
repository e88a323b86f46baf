// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filename policy: extension allow-list, upload sanitization and
//! containment of resolved paths inside the storage root.
//!
//! The allow-list and the containment check are independent. Downloads and
//! deletions must pass both; uploads pass the allow-list and are then
//! sanitized down to a single path segment, which cannot leave the root.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

use super::{StoreError, StoreResult};

/// Extensions (lowercase, without the dot) that may be stored or served.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "py", "js", "html", "css", "json",
];

/// Longest filename, in bytes, produced by [`sanitize_filename`].
pub const MAX_FILENAME_LEN: usize = 255;

/// Device names Windows refuses as regular file names.
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM0", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
    "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8",
    "LPT9",
];

/// Matches the usual kernel limit on chained symlinks.
const MAX_SYMLINK_HOPS: usize = 40;

/// Returns `true` if the text after the last `.` is an allowed extension,
/// compared case-insensitively. Names without a `.` are rejected.
pub fn is_allowed_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Reduce an untrusted filename to a single safe path segment.
///
/// The name is NFKD-normalized and stripped to ASCII, path separators
/// become whitespace, whitespace runs are joined with `_`, and anything
/// outside `[A-Za-z0-9_.-]` is dropped. Leading and trailing `.`/`_` are
/// trimmed, so the result never is `.`, `..` or a hidden file.
///
/// The result may be empty; callers must treat that as "no usable name".
///
/// ```rust,ignore
/// assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
/// assert_eq!(sanitize_filename("My cool movie.mov"), "My_cool_movie.mov");
/// ```
pub fn sanitize_filename(raw: &str) -> String {
    let ascii: String = raw
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let mut name = filtered.trim_matches(|c| c == '.' || c == '_').to_string();

    if !name.is_empty() {
        let stem = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
        if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
            name.insert(0, '_');
        }
    }

    truncate_name(name)
}

/// Keep the extension when shortening an over-long name. Input is ASCII,
/// so byte offsets are character boundaries.
fn truncate_name(name: String) -> String {
    if name.len() <= MAX_FILENAME_LEN {
        return name;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() + 1 < MAX_FILENAME_LEN => {
            let keep = MAX_FILENAME_LEN - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..MAX_FILENAME_LEN].to_string(),
    }
}

/// Join `name` onto `root` and resolve it to an absolute path that is
/// strictly inside the canonical `root`.
///
/// `..`, `.` and symlinks are resolved against the real filesystem. For a
/// target that does not exist yet, the deepest existing ancestor is
/// canonicalized and the remaining components are applied lexically.
///
/// # Errors
/// - `StoreError::PathEscape` if the result is `root` itself or lies
///   outside it (absolute names, `..` chains, symlinks pointing out,
///   embedded NUL bytes).
/// - `StoreError::Io` if `root` cannot be canonicalized or an ancestor
///   cannot be inspected.
pub fn resolve_within(root: &Path, name: &str) -> StoreResult<PathBuf> {
    if name.contains('\0') {
        return Err(StoreError::PathEscape);
    }

    let root = root.canonicalize()?;
    let resolved = resolve_lenient(&root.join(name))?;

    if resolved != root && resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(StoreError::PathEscape)
    }
}

fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut pending: Vec<OsString> = Vec::new();
    let mut hops = 0;

    let base = loop {
        match existing.canonicalize() {
            Ok(canonical) => break canonical,
            Err(e) if is_missing(&e) => {
                // A dangling link must be followed, not kept as a literal
                // name: opening it with `create` would land at its target.
                if is_symlink(&existing) {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    let target = fs::read_link(&existing)?;
                    let parent = existing.parent().map(Path::to_path_buf).unwrap_or_default();
                    existing = parent.join(target);
                    continue;
                }
                match existing.components().next_back() {
                    Some(last) => {
                        pending.push(last.as_os_str().to_os_string());
                        existing.pop();
                    }
                    None => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    };

    let mut resolved = base;
    for part in pending.iter().rev() {
        match Path::new(part).components().next() {
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::Normal(segment)) => resolved.push(segment),
            _ => {}
        }
    }
    Ok(resolved)
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
