//! Model file validation logic.

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::manifest::Manifest;
use crate::schema::ModelFile;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_model(model: &ModelFile) -> Result<(), ValidationError> {
    if model.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: model.version,
        });
    }

    let mut owner_ids = HashSet::new();
    for owner in &model.owners {
        if !owner_ids.insert(owner.id) {
            return Err(ValidationError::DuplicateId {
                id: owner.id.to_string(),
                context: "owners".to_string(),
            });
        }
        if owner.base_name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("owners[{}].base_name", owner.id),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(reducer) = &owner.reducer {
            validate_manifest(&reducer.results, &format!("owners[{}].reducer", owner.id))?;
        }
    }

    // Files outside the result root are kept by absolute name.
    for file in &model.disabled_files {
        let climbs = Path::new(file)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir));
        if file.is_empty() || climbs {
            return Err(ValidationError::InvalidValue {
                field: "disabled_files".to_string(),
                value: file.clone(),
                reason: "must be a normalized path".to_string(),
            });
        }
    }

    validate_manifest(&model.results, "results")
}

pub fn validate_manifest(manifest: &Manifest, field: &str) -> Result<(), ValidationError> {
    if manifest.task_name.is_empty() || manifest.task_name.contains(['/', '\\']) {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.task_name", field),
            value: manifest.task_name.clone(),
            reason: "must be a plain directory name".to_string(),
        });
    }

    if manifest.task_version == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.task_version", field),
            value: "0".to_string(),
            reason: "task versions start at 1".to_string(),
        });
    }

    for file in manifest.files().iter().chain(manifest.ignored()) {
        validate_relative(file, &format!("{}.files", field))?;
    }

    for sub in manifest.sub_tasks() {
        validate_manifest(sub, &format!("{}.{}", field, sub.task_name))?;
    }

    Ok(())
}

fn validate_relative(file: &str, field: &str) -> Result<(), ValidationError> {
    let escapes = Path::new(file)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if file.is_empty() || escapes {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: file.to_string(),
            reason: "must be a relative path inside its directory".to_string(),
        });
    }
    Ok(())
}
