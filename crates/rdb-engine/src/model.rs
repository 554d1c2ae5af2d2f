//! In-session state of the model the result database belongs to.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use rdb_core::{OwnerId, encode_owner_id_name};
use rdb_manifest::{Manifest, ModelFile, OwnerDef, ReducerDef};

use crate::ownership::OwnershipIndex;
use crate::{EngineError, EngineResult};

/// An owning component. Results scoped to it load only while it is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: OwnerId,
    pub base_name: String,
    pub loaded: bool,
    /// Reduction results stored with the component, rooted at their own directory.
    pub reducer: Option<Manifest>,
}

impl Owner {
    pub fn new(id: OwnerId, base_name: &str) -> Self {
        Self {
            id,
            base_name: base_name.to_string(),
            loaded: false,
            reducer: None,
        }
    }

    /// `<id>_<base_name>`, the name its result directories are created with.
    pub fn id_name(&self) -> String {
        encode_owner_id_name(self.id, &self.base_name)
    }
}

/// Result files excluded from loading, keyed by name relative to the result root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledFileRegistry {
    files: BTreeSet<String>,
}

impl DisabledFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        Self {
            files: entries.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains(key)
    }

    /// Returns true if the entry was not disabled before.
    pub fn disable(&mut self, key: String) -> bool {
        self.files.insert(key)
    }

    /// Returns true if the entry was disabled before.
    pub fn enable(&mut self, key: &str) -> bool {
        self.files.remove(key)
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.files.is_empty();
        self.files.clear();
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn relative_or_absolute(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// The model the engine reads owners and disabled files from and marks
/// as touched whenever something it persists changes.
#[derive(Debug)]
pub struct ResultModel {
    model_dir: PathBuf,
    root: PathBuf,
    owners: Vec<Owner>,
    disabled: DisabledFileRegistry,
    ownership: OwnershipIndex,
    touched: bool,
}

impl ResultModel {
    /// A model without owners whose result database lives at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            model_dir: root.parent().map(Path::to_path_buf).unwrap_or_default(),
            root,
            owners: Vec::new(),
            disabled: DisabledFileRegistry::new(),
            ownership: OwnershipIndex::new(),
            touched: false,
        }
    }

    pub fn from_model_file(file: &ModelFile) -> Self {
        let owners = file
            .owners
            .iter()
            .map(|def| Owner {
                id: def.id,
                base_name: def.base_name.clone(),
                loaded: def.loaded,
                reducer: def.reducer.as_ref().map(|r| r.results.clone()),
            })
            .collect();

        Self {
            model_dir: file.model_dir().to_path_buf(),
            root: file.absolute_result_root(),
            owners,
            disabled: DisabledFileRegistry::from_entries(file.disabled_files.iter().cloned()),
            ownership: OwnershipIndex::new(),
            touched: false,
        }
    }

    /// Writes owners, disabled files and the result root back into `file`.
    /// The result manifest itself is owned by the lifecycle.
    pub fn store_into(&self, file: &mut ModelFile) {
        file.result_root = relative_or_absolute(&self.model_dir, &self.root);
        file.owners = self
            .owners
            .iter()
            .map(|owner| OwnerDef {
                id: owner.id,
                base_name: owner.base_name.clone(),
                loaded: owner.loaded,
                reducer: owner.reducer.as_ref().map(|results| ReducerDef {
                    root: relative_or_absolute(&self.model_dir, results.base_path()),
                    results: results.clone(),
                }),
            })
            .collect();
        file.disabled_files = self.disabled.iter().cloned().collect();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
        self.touched = true;
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn set_touched(&mut self, touched: bool) {
        self.touched = touched;
    }

    // ---- owners ----------------------------------------------------------

    pub fn owners(&self) -> &[Owner] {
        &self.owners
    }

    pub fn owner(&self, id: OwnerId) -> Option<&Owner> {
        self.owners.iter().find(|owner| owner.id == id)
    }

    /// Mutable access to an owner. Drops the ownership index since the
    /// owner's name may change.
    pub fn owner_mut(&mut self, id: OwnerId) -> Option<&mut Owner> {
        self.ownership.invalidate();
        self.owners.iter_mut().find(|owner| owner.id == id)
    }

    /// Adds or replaces an owner.
    pub fn add_owner(&mut self, owner: Owner) {
        self.ownership.invalidate();
        match self.owners.iter_mut().find(|o| o.id == owner.id) {
            Some(existing) => *existing = owner,
            None => self.owners.push(owner),
        }
    }

    pub fn remove_owner(&mut self, id: OwnerId) -> Option<Owner> {
        let idx = self.owners.iter().position(|owner| owner.id == id)?;
        self.ownership.invalidate();
        Some(self.owners.remove(idx))
    }

    pub fn set_owner_loaded(&mut self, id: OwnerId, loaded: bool) -> EngineResult<()> {
        let owner = self
            .owners
            .iter_mut()
            .find(|owner| owner.id == id)
            .ok_or(EngineError::OwnerNotFound(id))?;
        if owner.loaded != loaded {
            owner.loaded = loaded;
            self.touched = true;
        }
        Ok(())
    }

    pub fn resolve_owner(&mut self, path: &Path) -> Option<OwnerId> {
        self.ownership.resolve(path, &self.owners)
    }

    pub fn invalidate_ownership(&mut self) {
        self.ownership.invalidate();
    }

    // ---- disabled files --------------------------------------------------

    pub fn disabled(&self) -> &DisabledFileRegistry {
        &self.disabled
    }

    /// Registry key of `path`: its '/' separated name under the result root,
    /// or the full path for files stored elsewhere.
    pub fn registry_key(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    pub fn is_enabled(&self, path: &Path) -> bool {
        !self.disabled.contains(&self.registry_key(path))
    }

    /// Returns true if the file was enabled before.
    pub fn disable_file(&mut self, path: &Path) -> bool {
        let changed = self.disabled.disable(self.registry_key(path));
        self.touched |= changed;
        changed
    }

    /// Returns true if the file was disabled before.
    pub fn enable_file(&mut self, path: &Path) -> bool {
        let key = self.registry_key(path);
        let changed = self.disabled.enable(&key);
        self.touched |= changed;
        changed
    }

    /// Drops registry entries for `paths`, returning how many were present.
    pub fn enable_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) -> usize {
        paths
            .into_iter()
            .filter(|path| self.enable_file(path))
            .count()
    }

    pub fn enable_all(&mut self) -> bool {
        let changed = self.disabled.clear();
        self.touched |= changed;
        changed
    }
}
