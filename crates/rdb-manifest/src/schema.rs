//! Persisted model file definitions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rdb_core::OwnerId;
use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;

fn default_result_root() -> PathBuf {
    PathBuf::from("results")
}

/// Everything a model persists about its result database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelFile {
    pub version: u32,
    pub name: String,
    /// Root of the result database, relative to the model file unless absolute.
    #[serde(default = "default_result_root")]
    pub result_root: PathBuf,
    #[serde(default)]
    pub owners: Vec<OwnerDef>,
    /// Disabled result files, relative to the result root.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub disabled_files: BTreeSet<String>,
    #[serde(default)]
    pub results: Manifest,
    #[serde(skip)]
    model_dir: PathBuf,
}

/// An owning component whose scoped results are gated on its load state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerDef {
    pub id: OwnerId,
    /// Base name of the component's source file, without extension.
    pub base_name: String,
    /// Whether the component's detailed data is loaded in memory.
    #[serde(default)]
    pub loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reducer: Option<ReducerDef>,
}

/// Reduction results stored with the component itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReducerDef {
    /// Directory holding the reducer task directories, relative to the model file unless absolute.
    pub root: PathBuf,
    #[serde(default)]
    pub results: Manifest,
}

impl ModelFile {
    pub fn new(name: &str) -> Self {
        Self {
            version: crate::migrate::LATEST_VERSION,
            name: name.to_string(),
            result_root: default_result_root(),
            owners: Vec::new(),
            disabled_files: BTreeSet::new(),
            results: Manifest::default(),
            model_dir: PathBuf::new(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn absolute_result_root(&self) -> PathBuf {
        self.model_dir.join(&self.result_root)
    }

    /// Roots all manifests relative to the directory holding the model file.
    pub fn attach(&mut self, model_dir: &Path) {
        self.model_dir = model_dir.to_path_buf();
        let root = self.absolute_result_root();
        self.results.set_path(root);
        for owner in &mut self.owners {
            if let Some(reducer) = &mut owner.reducer {
                let root = model_dir.join(&reducer.root);
                reducer.results.set_path(root);
            }
        }
    }
}
