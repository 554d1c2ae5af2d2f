//! Set difference between the in-memory manifest and disk.

use rdb_core::{FileSet, diff};
use rdb_manifest::Manifest;

/// Outcome of comparing a memory manifest `M` with a disk manifest `D`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// `D \ M`: on disk but not recorded.
    pub adopted: FileSet,
    /// `M \ D`: recorded but gone from disk.
    pub lost: FileSet,
}

impl Reconciliation {
    /// True iff `M = D`.
    pub fn unchanged(&self) -> bool {
        self.adopted.is_empty() && self.lost.is_empty()
    }

    /// Brings `memory` in line with disk: drops lost files and records adopted ones.
    pub fn apply(&self, memory: &mut Manifest) {
        memory.remove_files(&self.lost);
        memory.add_files(&self.adopted);
    }
}

pub fn reconcile_sets(memory: &FileSet, disk: &FileSet) -> Reconciliation {
    Reconciliation {
        adopted: diff(disk, memory),
        lost: diff(memory, disk),
    }
}

/// Compares every file of both trees, sub-tasks included.
pub fn reconcile(memory: &Manifest, disk: &Manifest) -> Reconciliation {
    reconcile_sets(&memory.all_file_names(None), &disk.all_file_names(None))
}
