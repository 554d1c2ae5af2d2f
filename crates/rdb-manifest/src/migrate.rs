//! Model file format migration framework.
//!
//! Version 1 is the first released format, so there are no steps yet. A
//! file that predates it has no known layout and is rejected.

use crate::ManifestError;
use crate::schema::ModelFile;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut model: ModelFile) -> Result<ModelFile, ManifestError> {
    while model.version < LATEST_VERSION {
        model = migrate_one_version(model)?;
    }
    Ok(model)
}

fn migrate_one_version(model: ModelFile) -> Result<ModelFile, ManifestError> {
    Err(ManifestError::Migration {
        what: format!("No migration path from version {}", model.version),
    })
}
