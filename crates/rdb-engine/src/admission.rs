//! The gate deciding whether a result file is handed to the extractor.

use std::path::Path;

use rdb_core::{FileCategory, GAGE_RECOVERY_MARKER, OwnerId};

use crate::model::ResultModel;

/// Everything [`admit`] looks at for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub path: &'a Path,
    pub category: FileCategory,
    pub owner: Option<OwnerId>,
    pub is_disabled: bool,
    pub owner_is_loaded: bool,
}

impl<'a> Candidate<'a> {
    /// Resolves owner and enabled state of `path` against the model.
    pub fn for_path(path: &'a Path, model: &mut ResultModel) -> Self {
        let owner = model.resolve_owner(path);
        let owner_is_loaded = owner
            .and_then(|id| model.owner(id))
            .is_some_and(|owner| owner.loaded);
        Self {
            path,
            category: FileCategory::classify(&path.to_string_lossy()),
            owner,
            is_disabled: !model.is_enabled(path),
            owner_is_loaded,
        }
    }
}

/// Admission rule, first match wins:
/// disabled files never load, files without an owner always load, gage
/// recovery results always load, anything else loads only if its owner is
/// loaded.
pub fn admit(candidate: &Candidate<'_>) -> bool {
    if candidate.is_disabled {
        return false;
    }
    if candidate.owner.is_none() {
        return true;
    }
    if candidate
        .path
        .to_string_lossy()
        .contains(GAGE_RECOVERY_MARKER)
    {
        return true;
    }
    candidate.owner_is_loaded
}
