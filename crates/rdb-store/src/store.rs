//! Snapshot directory layout under a model's result root.

use std::fs;
use std::path::{Path, PathBuf};

use rdb_core::{TaskDir, decode_task_dir, encode_task_dir};

use crate::StoreResult;
use crate::scanner::{ScanOutcome, scan_task_dir};

/// A `<task_name>_<version>` directory found under the result root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDirEntry {
    pub path: PathBuf,
    pub dir: TaskDir,
}

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn exists(&self) -> bool {
        self.root_dir.is_dir()
    }

    pub fn task_dir(&self, task_name: &str, version: u32) -> PathBuf {
        self.root_dir.join(encode_task_dir(task_name, version))
    }

    pub fn scan(&self, task_name: &str, version: u32) -> StoreResult<ScanOutcome> {
        scan_task_dir(&self.task_dir(task_name, version), task_name, version)
    }

    /// Directories named `<task_name>_*`, newest version first.
    /// Directories without a numeric version come last.
    pub fn list_task_dirs(&self, task_name: &str) -> StoreResult<Vec<TaskDirEntry>> {
        let mut dirs = Vec::new();

        if !self.exists() {
            return Ok(dirs);
        }

        let prefix = format!("{}_", task_name);
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) {
                continue;
            }
            let dir = decode_task_dir(&name);
            if dir.version.is_some() && dir.task_name != task_name {
                continue;
            }
            dirs.push(TaskDirEntry {
                path: entry.path(),
                dir,
            });
        }

        dirs.sort_by(|a, b| b.dir.version.cmp(&a.dir.version));
        Ok(dirs)
    }
}
