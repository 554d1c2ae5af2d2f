//! Best-effort filesystem operations.
//!
//! Failures are logged with the offending path and reported as `false`;
//! callers carry on with the rest of their work.

use std::fs;
use std::path::Path;

use tracing::warn;

pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|meta| meta.len())
}

/// Deletes a file. A file that is already gone counts as deleted.
pub fn delete_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => {
            warn!(path = %path.display(), %err, "problems deleting file");
            false
        }
    }
}

/// Removes a directory and everything below it.
pub fn remove_dir(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), %err, "problems removing directory");
            false
        }
    }
}

/// Removes empty directories below and including `path`, bottom-up.
/// Returns true when `path` itself is gone afterwards.
pub fn prune_empty_dirs(path: &Path) -> bool {
    let Ok(entries) = fs::read_dir(path) else {
        return !path.exists();
    };
    for entry in entries.flatten() {
        let child = entry.path();
        if child.is_dir() {
            prune_empty_dirs(&child);
        }
    }
    // fails on non-empty directories
    fs::remove_dir(path).is_ok()
}

/// Removes `path` only if it is an empty directory.
pub fn remove_dir_if_empty(path: &Path) -> bool {
    fs::remove_dir(path).is_ok()
}

pub fn ensure_dir(path: &Path) -> bool {
    match fs::create_dir_all(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), %err, "problems creating directory");
            false
        }
    }
}

/// Copies a file, creating the target's parent directories.
pub fn copy_file(from: &Path, to: &Path) -> bool {
    if let Some(parent) = to.parent()
        && !ensure_dir(parent)
    {
        return false;
    }
    match fs::copy(from, to) {
        Ok(_) => true,
        Err(err) => {
            warn!(from = %from.display(), to = %to.display(), %err, "problems copying file");
            false
        }
    }
}
