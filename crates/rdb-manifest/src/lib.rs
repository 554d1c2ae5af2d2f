//! rdb-manifest: the result status record and the persisted model file.

pub mod manifest;
pub mod migrate;
pub mod schema;
pub mod validate;

pub use manifest::Manifest;
pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{ValidationError, validate_manifest, validate_model};

use std::path::Path;

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn model_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

pub fn load_yaml(path: &Path) -> ManifestResult<ModelFile> {
    let content = std::fs::read_to_string(path)?;
    let mut model: ModelFile = serde_yaml::from_str(&content)?;
    model = migrate_to_latest(model)?;
    validate_model(&model)?;
    model.attach(model_dir(path));
    Ok(model)
}

pub fn save_yaml(path: &Path, model: &ModelFile) -> ManifestResult<()> {
    validate_model(model)?;
    let content = serde_yaml::to_string(model)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ManifestResult<ModelFile> {
    let content = std::fs::read_to_string(path)?;
    let mut model: ModelFile = serde_json::from_str(&content)?;
    model = migrate_to_latest(model)?;
    validate_model(&model)?;
    model.attach(model_dir(path));
    Ok(model)
}

pub fn save_json(path: &Path, model: &ModelFile) -> ManifestResult<()> {
    validate_model(model)?;
    let content = serde_json::to_string_pretty(model)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Loads a model file, picking the format from the extension (YAML unless `.json`).
pub fn load_model(path: &Path) -> ManifestResult<ModelFile> {
    if rdb_core::has_extension(path, "json") {
        load_json(path)
    } else {
        load_yaml(path)
    }
}

pub fn save_model(path: &Path, model: &ModelFile) -> ManifestResult<()> {
    if rdb_core::has_extension(path, "json") {
        save_json(path, model)
    } else {
        save_yaml(path, model)
    }
}
