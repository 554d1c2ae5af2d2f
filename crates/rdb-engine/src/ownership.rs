//! Lazily built map from owner id names to owners.

use std::collections::HashMap;
use std::path::Path;

use rdb_core::{OwnerId, strip_solve_task_id};

use crate::model::Owner;

/// Resolves result files to their owning component.
///
/// Built on first use from the owner list. Must be invalidated whenever the
/// set of owners changes (a model is closed or reopened), otherwise stale
/// names keep resolving.
#[derive(Debug)]
pub struct OwnershipIndex {
    by_id_name: HashMap<String, OwnerId>,
    dirty: bool,
}

impl Default for OwnershipIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self {
            by_id_name: HashMap::new(),
            dirty: true,
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_built(&self) -> bool {
        !self.dirty
    }

    fn rebuild(&mut self, owners: &[Owner]) {
        self.by_id_name = owners
            .iter()
            .map(|owner| (owner.id_name(), owner.id))
            .collect();
        self.dirty = false;
    }

    /// Owner of `path`, looked up by its parent directory name first and by
    /// its own stem second, each with any trailing `_<digits>` removed.
    pub fn resolve(&mut self, path: &Path, owners: &[Owner]) -> Option<OwnerId> {
        if self.dirty {
            self.rebuild(owners);
        }

        let parent = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy());
        let stem = path.file_stem().map(|name| name.to_string_lossy());

        [parent, stem]
            .into_iter()
            .flatten()
            .find_map(|name| self.by_id_name.get(strip_solve_task_id(&name)).copied())
    }
}
