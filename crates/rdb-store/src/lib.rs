//! rdb-store: snapshot directory scanning and filesystem plumbing.

pub mod fsops;
pub mod scanner;
pub mod store;

pub use scanner::{DiskScan, ScanOutcome, scan_task_dir};
pub use store::{SnapshotStore, TaskDirEntry};

use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read snapshot directory {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
}
