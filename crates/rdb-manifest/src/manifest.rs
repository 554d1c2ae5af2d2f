//! The result status record (RSD) of one task generation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use rdb_core::{FileCategory, FileSet, decode_task_dir, encode_task_dir, has_extension};
use serde::{Deserialize, Serialize};

/// Membership record of the result files of a task and its sub-tasks.
///
/// File entries are stored relative to the manifest's own task directory
/// `<base_path>/<task_name>_<task_version>`, so every entry is rooted under
/// the snapshot directory implied by the manifest. Sub-tasks (one per
/// simulation event, or per owning component) live in versioned
/// sub-directories of their parent's task directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub task_name: String,
    pub task_version: u32,
    #[serde(skip)]
    base_path: PathBuf,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    files: BTreeSet<String>,
    /// Files found on disk that were deliberately not adopted.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    ignored: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    sub_tasks: BTreeMap<String, Manifest>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new(rdb_core::DEFAULT_TASK_NAME, 1)
    }
}

impl Manifest {
    pub fn new(task_name: &str, task_version: u32) -> Self {
        Self {
            task_name: task_name.to_string(),
            task_version,
            base_path: PathBuf::new(),
            files: BTreeSet::new(),
            ignored: BTreeSet::new(),
            sub_tasks: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.set_path(base_path);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Re-roots the manifest (and recursively its sub-tasks).
    pub fn set_path(&mut self, base_path: impl Into<PathBuf>) {
        self.base_path = base_path.into();
        let task_dir = self.task_dir();
        for sub in self.sub_tasks.values_mut() {
            sub.set_path(task_dir.clone());
        }
    }

    pub fn set_task(&mut self, task_name: &str, task_version: u32) {
        self.task_name = task_name.to_string();
        self.task_version = task_version;
        let base = std::mem::take(&mut self.base_path);
        self.set_path(base);
    }

    pub fn task_dir_name(&self) -> String {
        encode_task_dir(&self.task_name, self.task_version)
    }

    /// Absolute path of the snapshot directory of this generation.
    pub fn task_dir(&self) -> PathBuf {
        self.base_path.join(self.task_dir_name())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.sub_tasks.values().all(Manifest::is_empty)
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.ignored.clear();
        self.sub_tasks.clear();
    }

    /// Starts a new generation. The old entries are not valid under the new
    /// version, so they are dropped from the record (not from disk).
    pub fn increment_version(&mut self) {
        self.clear();
        self.task_version += 1;
    }

    /// Entries of this task only, relative to [`Manifest::task_dir`].
    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    pub fn sub_task(&self, name: &str) -> Option<&Manifest> {
        self.sub_tasks.get(name)
    }

    pub fn sub_task_mut(&mut self, name: &str) -> Option<&mut Manifest> {
        self.sub_tasks.get_mut(name)
    }

    pub fn sub_tasks(&self) -> impl Iterator<Item = &Manifest> {
        self.sub_tasks.values()
    }

    /// Returns the named sub-task, creating it at `task_version` if missing.
    pub fn ensure_sub_task(&mut self, name: &str, task_version: u32) -> &mut Manifest {
        let task_dir = self.task_dir();
        self.sub_tasks
            .entry(name.to_string())
            .or_insert_with(|| Manifest::new(name, task_version).with_path(task_dir))
    }

    /// Number of file entries in the whole tree.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.sub_tasks.values().map(Manifest::file_count).sum::<usize>()
    }

    /// Absolute names of all files in the tree, optionally of one extension only.
    pub fn all_file_names(&self, extension: Option<&str>) -> FileSet {
        let mut out = FileSet::new();
        self.collect_files(extension, &mut out);
        out
    }

    fn collect_files(&self, extension: Option<&str>, out: &mut FileSet) {
        let task_dir = self.task_dir();
        for file in &self.files {
            let path = task_dir.join(file);
            if extension.is_none_or(|ext| has_extension(&path, ext)) {
                out.insert(path);
            }
        }
        for sub in self.sub_tasks.values() {
            sub.collect_files(extension, out);
        }
    }

    /// Absolute names of all ignored files in the tree.
    pub fn ignored_file_names(&self) -> FileSet {
        let mut out: FileSet = self
            .ignored
            .iter()
            .map(|file| self.task_dir().join(file))
            .collect();
        for sub in self.sub_tasks.values() {
            out.extend(sub.ignored_file_names());
        }
        out
    }

    /// Task directories of the tree, this one included.
    pub fn all_dir_names(&self) -> FileSet {
        let mut out = FileSet::new();
        out.insert(self.task_dir());
        for sub in self.sub_tasks.values() {
            out.extend(sub.all_dir_names());
        }
        out
    }

    /// Absolute file names grouped by result category.
    pub fn files_by_category(&self) -> BTreeMap<FileCategory, FileSet> {
        let root = self.task_dir();
        let mut out: BTreeMap<FileCategory, FileSet> = BTreeMap::new();
        for path in self.all_file_names(None) {
            let rel = rdb_core::relative_name(&root, &path);
            out.entry(FileCategory::classify(&rel))
                .or_default()
                .insert(path);
        }
        out
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.locate(path)
            .is_some_and(|(node, rel)| node.files.contains(&rel))
    }

    /// Adds absolute file names, creating sub-tasks for versioned
    /// sub-directories. Files outside the task directory, or inside a
    /// sub-task directory of another version than a non-empty sub-task
    /// already recorded, are skipped.
    /// Returns the number of new entries.
    pub fn add_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) -> usize {
        let mut added = 0;
        for path in paths {
            if let Some((node, rel)) = self.locate_mut(path, true) {
                node.ignored.remove(&rel);
                if node.files.insert(rel) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Removes absolute file names. Returns the number of entries dropped.
    pub fn remove_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) -> usize {
        let mut removed = 0;
        for path in paths {
            if let Some((node, rel)) = self.locate_mut(path, false) {
                node.ignored.remove(&rel);
                if node.files.remove(&rel) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Records files that should not be offered for adoption again.
    pub fn ignore_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            if let Some((node, rel)) = self.locate_mut(path, true)
                && !node.files.contains(&rel)
            {
                node.ignored.insert(rel);
            }
        }
    }

    pub fn clear_ignored(&mut self) {
        self.ignored.clear();
        for sub in self.sub_tasks.values_mut() {
            sub.clear_ignored();
        }
    }

    fn relative_components(&self, path: &Path) -> Option<Vec<String>> {
        let rel = path.strip_prefix(self.task_dir()).ok()?;
        let mut comps = Vec::new();
        for comp in rel.components() {
            match comp {
                Component::Normal(name) => comps.push(name.to_string_lossy().into_owned()),
                _ => return None,
            }
        }
        if comps.is_empty() { None } else { Some(comps) }
    }

    fn locate(&self, path: &Path) -> Option<(&Manifest, String)> {
        let comps = self.relative_components(path)?;
        let mut node = self;
        let mut idx = 0;
        while idx + 1 < comps.len() {
            let dir = decode_task_dir(&comps[idx]);
            let Some(version) = dir.version else { break };
            let sub = node.sub_tasks.get(&dir.task_name)?;
            if sub.task_version != version {
                return None;
            }
            node = sub;
            idx += 1;
        }
        Some((node, comps[idx..].join("/")))
    }

    fn locate_mut(&mut self, path: &Path, create: bool) -> Option<(&mut Manifest, String)> {
        let comps = self.relative_components(path)?;
        let mut node = self;
        let mut idx = 0;
        while idx + 1 < comps.len() {
            let dir = decode_task_dir(&comps[idx]);
            let Some(version) = dir.version else { break };
            if !node.sub_tasks.contains_key(&dir.task_name) {
                if !create {
                    return None;
                }
                node.ensure_sub_task(&dir.task_name, version);
            }
            let sub = node.sub_tasks.get_mut(&dir.task_name)?;
            if sub.task_version != version {
                // an emptied sub-task follows the generation found on disk
                if !create || !sub.is_empty() {
                    return None;
                }
                sub.clear();
                sub.set_task(&dir.task_name, version);
            }
            node = sub;
            idx += 1;
        }
        Some((node, comps[idx..].join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest::new("response", 2).with_path("/model/results")
    }

    #[test]
    fn task_dir_is_versioned() {
        let m = manifest();
        assert_eq!(m.task_dir(), PathBuf::from("/model/results/response_2"));
        assert!(m.is_empty());
    }

    #[test]
    fn add_files_builds_sub_tasks() {
        let mut m = manifest();
        let files = vec![
            PathBuf::from("/model/results/response_2/timehist_prim_1.frs"),
            PathBuf::from("/model/results/response_2/3_wing_1/timehist_rcy_1.frs"),
            PathBuf::from("/model/results/response_2/link_DB/wing.fmx"),
            PathBuf::from("/model/results/response_1/stale.frs"),
        ];
        assert_eq!(m.add_files(&files), 3);

        let wing = m.sub_task("3_wing").expect("sub-task created");
        assert_eq!(wing.task_version, 1);
        assert!(wing.files().contains("timehist_rcy_1.frs"));
        assert!(m.files().contains("link_DB/wing.fmx"));

        assert_eq!(m.all_file_names(None).len(), 3);
        assert_eq!(m.all_file_names(Some("frs")).len(), 2);
        assert!(m.contains(&files[1]));
        assert!(!m.contains(&files[3]));
        assert_eq!(m.file_count(), 3);
    }

    #[test]
    fn emptied_sub_task_moves_to_new_generation() {
        let mut m = manifest();
        let old = PathBuf::from("/model/results/response_2/3_wing_1/a.frs");
        let new = PathBuf::from("/model/results/response_2/3_wing_2/a.frs");
        m.add_files([&old]);
        assert_eq!(m.add_files([&new]), 0);

        m.remove_files([&old]);
        assert_eq!(m.add_files([&new]), 1);
        assert_eq!(m.sub_task("3_wing").unwrap().task_version, 2);
        assert!(m.contains(&new));
    }

    #[test]
    fn remove_and_ignore() {
        let mut m = manifest();
        let a = PathBuf::from("/model/results/response_2/a.frs");
        let b = PathBuf::from("/model/results/response_2/b.frs");
        m.add_files([&a]);
        m.ignore_files([&a, &b]);

        // already a member, so only b is ignored
        assert_eq!(m.ignored_file_names().len(), 1);
        assert!(m.ignored_file_names().contains(&b));

        assert_eq!(m.remove_files([&a, &b]), 1);
        assert!(m.is_empty());
        assert!(m.ignored_file_names().is_empty());
    }

    #[test]
    fn increment_drops_entries() {
        let mut m = manifest();
        m.add_files([&PathBuf::from("/model/results/response_2/3_wing_1/x.frs")]);
        m.increment_version();
        assert_eq!(m.task_version, 3);
        assert!(m.is_empty());
        assert!(m.sub_task("3_wing").is_none());
    }

    #[test]
    fn set_path_reroots_sub_tasks() {
        let mut m = manifest();
        m.add_files([&PathBuf::from("/model/results/response_2/event_1/a.frs")]);
        m.set_path("/copy");
        m.set_task("response", 1);
        assert_eq!(
            m.all_file_names(None).into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/copy/response_1/event_1/a.frs")]
        );
        assert_eq!(m.all_dir_names().len(), 2);
    }

    #[test]
    fn categories() {
        let mut m = manifest();
        m.add_files(&[
            PathBuf::from("/model/results/response_2/timehist_prim_1.frs"),
            PathBuf::from("/model/results/response_2/3_wing_1/timehist_gage_rcy_1.frs"),
        ]);
        let by_cat = m.files_by_category();
        assert_eq!(by_cat.len(), 2);
        assert!(by_cat.contains_key(&FileCategory::GageRecovery));
    }
}
