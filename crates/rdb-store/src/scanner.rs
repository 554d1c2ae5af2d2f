//! Builds an ephemeral manifest from what is physically in a snapshot directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use rdb_core::{FileCategory, FileSet, decode_task_dir};
use rdb_manifest::Manifest;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{StoreError, StoreResult};

/// Disk state of one task generation.
#[derive(Debug, Clone)]
pub struct DiskScan {
    /// Live files, never persisted.
    pub state: Manifest,
    /// Files of stale generations or of unrecognized kinds.
    pub obsolete: FileSet,
}

impl DiskScan {
    pub fn empty(base_path: &Path, task_name: &str, task_version: u32) -> Self {
        Self {
            state: Manifest::new(task_name, task_version).with_path(base_path),
            obsolete: FileSet::new(),
        }
    }

    pub fn has_results(&self) -> bool {
        !self.state.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Scanned(DiskScan),
    /// The snapshot directory does not exist.
    NoResultsYet,
}

impl ScanOutcome {
    /// Treats a missing directory as an empty generation.
    pub fn into_scan(self, base_path: &Path, task_name: &str, task_version: u32) -> DiskScan {
        match self {
            ScanOutcome::Scanned(scan) => scan,
            ScanOutcome::NoResultsYet => DiskScan::empty(base_path, task_name, task_version),
        }
    }
}

/// Scans `snapshot_dir`, expected to be `<task_name>_<expected_version>`.
///
/// A file is obsolete when it sits under a sub-task directory that is not
/// the newest version of that sub-task, when the snapshot directory itself is
/// not the expected generation, or when it has no recognized result extension.
pub fn scan_task_dir(
    snapshot_dir: &Path,
    task_name: &str,
    expected_version: u32,
) -> StoreResult<ScanOutcome> {
    if !snapshot_dir.is_dir() {
        return Ok(ScanOutcome::NoResultsYet);
    }

    fs::read_dir(snapshot_dir).map_err(|source| StoreError::Scan {
        path: snapshot_dir.to_path_buf(),
        source,
    })?;

    let base_path = snapshot_dir.parent().unwrap_or(Path::new(""));
    let dir_name = snapshot_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let decoded = decode_task_dir(&dir_name);
    let expected_generation =
        decoded.task_name == task_name && decoded.version == Some(expected_version);

    let mut files = Vec::new();
    let mut newest: HashMap<(PathBuf, String), u32> = HashMap::new();
    for entry in WalkDir::new(snapshot_dir).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, "failed to walk snapshot directory entry");
                continue;
            }
        };
        let Ok(rel) = entry.path().strip_prefix(snapshot_dir) else {
            continue;
        };
        let rel = rel.to_path_buf();
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let dir = decode_task_dir(&name);
            if let Some(version) = dir.version {
                let parent = rel.parent().map(Path::to_path_buf).unwrap_or_default();
                let slot = newest.entry((parent, dir.task_name)).or_insert(version);
                *slot = (*slot).max(version);
            }
        } else if entry.file_type().is_file() {
            files.push(rel);
        }
    }

    let mut live = FileSet::new();
    let mut obsolete = FileSet::new();
    for rel in files {
        let path = snapshot_dir.join(&rel);
        if !expected_generation
            || FileCategory::classify_path(&rel).is_none()
            || in_stale_sub_task(&rel, &newest)
        {
            obsolete.insert(path);
        } else {
            live.insert(path);
        }
    }

    let mut state = Manifest::new(task_name, expected_version).with_path(base_path);
    state.add_files(&live);

    debug!(
        dir = %snapshot_dir.display(),
        live = live.len(),
        obsolete = obsolete.len(),
        "scanned snapshot directory"
    );

    Ok(ScanOutcome::Scanned(DiskScan { state, obsolete }))
}

/// Sub-tasks are the leading run of versioned directories in a relative path.
fn in_stale_sub_task(rel: &Path, newest: &HashMap<(PathBuf, String), u32>) -> bool {
    let Some(parent) = rel.parent() else {
        return false;
    };

    let mut prefix = PathBuf::new();
    for comp in parent.components() {
        let Component::Normal(name) = comp else {
            return false;
        };
        let dir = decode_task_dir(&name.to_string_lossy());
        let Some(version) = dir.version else {
            return false;
        };
        let key = (prefix.clone(), dir.task_name);
        if newest.get(&key).is_some_and(|max| *max != version) {
            return true;
        }
        prefix.push(name);
    }
    false
}
