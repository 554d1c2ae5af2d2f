//! The open/sync/save/increment/close lifecycle of a result database.
//!
//! A [`SnapshotLifecycle`] owns the current manifest of one model and the
//! manifest as it was when the database was opened (or last saved). Every
//! operation starts by reconciling the current manifest with what is on
//! disk, so the manifest never lists a file that is gone and never silently
//! misses one that appeared.

use std::fmt;
use std::path::{Path, PathBuf};

use rdb_core::{
    FileSet, OwnerId, RESULT_CONTAINER_EXT, SOLVER_LOG_EXT, decode_task_dir, diff,
    has_extension, union,
};
use rdb_manifest::Manifest;
use rdb_store::{DiskScan, ScanOutcome, SnapshotStore, fsops, scan_task_dir};
use tracing::{debug, info, warn};

use crate::admission::{Candidate, admit};
use crate::dedup::filter_most_recent_only;
use crate::extractor::Extractor;
use crate::model::ResultModel;
use crate::policy::{AdoptionPolicy, AdoptionPrompt};
use crate::reconcile::reconcile;
use crate::report::CategoryReport;
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing opened yet.
    Empty,
    Open,
    /// Manifest matches disk and nothing is pending.
    Synced,
    /// The manifest changed since the last save.
    Dirty,
    Closed,
}

impl LifecycleState {
    fn is_open(self) -> bool {
        matches!(
            self,
            LifecycleState::Open | LifecycleState::Synced | LifecycleState::Dirty
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Empty => "empty",
            LifecycleState::Open => "open",
            LifecycleState::Synced => "synced",
            LifecycleState::Dirty => "dirty",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Load the reduction results of loaded owners along with the database.
    pub include_reducer_files: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            include_reducer_files: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Push the admission delta to the extractor.
    pub update_extractor: bool,
    /// Also load solver progress logs, for polling a running solver.
    pub add_res_files: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            update_extractor: true,
            add_res_files: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenReport {
    pub task_dir: PathBuf,
    pub adopted: FileSet,
    /// Found on disk but declined.
    pub ignored: FileSet,
    pub lost: FileSet,
    /// Recorded files still on disk but belonging to a stale sub-task version.
    pub superseded: FileSet,
    pub obsolete: FileSet,
    /// Files handed to the extractor, reducer files included.
    pub admitted: Vec<PathBuf>,
    pub categories: CategoryReport,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub adopted: FileSet,
    pub lost: FileSet,
    /// Recorded files still on disk but belonging to a stale sub-task version.
    pub superseded: FileSet,
    /// New on disk but previously declined.
    pub skipped: FileSet,
    pub obsolete: FileSet,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl SyncReport {
    /// True when the manifest did not change.
    pub fn unchanged(&self) -> bool {
        self.adopted.is_empty() && self.lost.is_empty() && self.superseded.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    pub sync: SyncReport,
    pub deleted: FileSet,
    pub removed_dirs: Vec<PathBuf>,
    pub failed: FileSet,
}

#[derive(Debug, Clone, Default)]
pub struct CloseReport {
    pub deleted: FileSet,
    pub removed_dirs: Vec<PathBuf>,
    pub failed: FileSet,
}

#[derive(Debug, Clone, Default)]
pub struct SaveAsReport {
    /// Copies, by their new name.
    pub copied: FileSet,
    /// Originals that could not be copied.
    pub failed: FileSet,
    pub close: CloseReport,
}

#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    pub removed: FileSet,
    pub failed: FileSet,
}

/// Drives one model's result database through its lifecycle.
pub struct SnapshotLifecycle {
    state: LifecycleState,
    current: Manifest,
    initial: Manifest,
    options: LifecycleOptions,
    policy: Box<dyn AdoptionPolicy>,
    extractor: Option<Box<dyn Extractor>>,
    /// Manifest files currently held by the extractor.
    admitted: FileSet,
    /// Reducer files currently held by the extractor.
    reducer_files: FileSet,
    polled_res_files: FileSet,
}

impl fmt::Debug for SnapshotLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotLifecycle")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("admitted", &self.admitted.len())
            .field("has_extractor", &self.extractor.is_some())
            .finish_non_exhaustive()
    }
}

impl SnapshotLifecycle {
    /// A lifecycle for the persisted manifest of a model. Without an
    /// extractor nothing is loaded, which is how batch tools run.
    pub fn new(manifest: Manifest, policy: impl AdoptionPolicy + 'static) -> Self {
        Self {
            state: LifecycleState::Empty,
            initial: manifest.clone(),
            current: manifest,
            options: LifecycleOptions::default(),
            policy: Box::new(policy),
            extractor: None,
            admitted: FileSet::new(),
            reducer_files: FileSet::new(),
            polled_res_files: FileSet::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn with_options(mut self, options: LifecycleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn manifest(&self) -> &Manifest {
        &self.current
    }

    /// The manifest as of the last open or save.
    pub fn initial_manifest(&self) -> &Manifest {
        &self.initial
    }

    pub fn admitted(&self) -> &FileSet {
        &self.admitted
    }

    pub fn reducer_files(&self) -> &FileSet {
        &self.reducer_files
    }

    fn require_open(&self, operation: &'static str) -> EngineResult<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    // ---- open -------------------------------------------------------------

    /// Opens the result database under the model's result root.
    ///
    /// An empty manifest probes the existing snapshot directories newest
    /// first and offers the first one holding results for adoption. A
    /// non-empty manifest is reconciled with its own snapshot directory.
    /// Admitted files are then handed to the extractor in one batch.
    pub fn open(&mut self, model: &mut ResultModel) -> EngineResult<OpenReport> {
        if !matches!(self.state, LifecycleState::Empty | LifecycleState::Closed) {
            return Err(EngineError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }

        let root = model.root().to_path_buf();
        self.current.set_path(&root);
        info!(root = %root.display(), "scanning for results");

        let mut report = OpenReport::default();
        let readable = if self.current.is_empty() {
            self.open_unrecorded(model, &mut report);
            true
        } else {
            self.open_recorded(model, &mut report)
        };

        report.task_dir = self.current.task_dir();
        self.initial = self.current.clone();
        self.admitted.clear();
        self.reducer_files.clear();
        self.polled_res_files.clear();
        self.state = LifecycleState::Open;

        if readable {
            self.admit_on_open(model, &mut report);
        }
        Ok(report)
    }

    fn open_unrecorded(&mut self, model: &mut ResultModel, report: &mut OpenReport) {
        let root = self.current.base_path().to_path_buf();
        let task_name = self.current.task_name.clone();

        let dirs = match SnapshotStore::new(&root).list_task_dirs(&task_name) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(root = %root.display(), %err, "failed to list result directories");
                report.warnings.push(err.to_string());
                Vec::new()
            }
        };

        for entry in dirs {
            let Some(version) = entry.dir.version else {
                continue;
            };
            let scan = match scan_task_dir(&entry.path, &task_name, version) {
                Ok(outcome) => outcome.into_scan(&root, &task_name, version),
                Err(err) => {
                    warn!(dir = %entry.path.display(), %err, "skipping unreadable result directory");
                    continue;
                }
            };
            if !scan.has_results() {
                continue;
            }

            let files = scan.state.all_file_names(None);
            let adopt = self.policy.adopt(&AdoptionPrompt {
                task_dir: &entry.path,
                files: &files,
                obsolete: &scan.obsolete,
                abandoned: true,
            });

            if adopt {
                info!(
                    dir = %entry.path.display(),
                    count = files.len(),
                    "including results not referred to by the model"
                );
                if !scan.obsolete.is_empty() {
                    warn!(
                        count = scan.obsolete.len(),
                        "obsolete result files will be deleted on save"
                    );
                }
                self.current = scan.state;
                self.current.set_path(&root);
                report.adopted = files;
                report.obsolete = scan.obsolete;
            } else {
                info!(
                    dir = %entry.path.display(),
                    "ignoring results not referred to by the model"
                );
                report.warnings.push(format!(
                    "results in {} were not included and will be deleted on save",
                    entry.path.display()
                ));
                self.current.clear();
                self.current.set_task(&task_name, version + 1);
                report.ignored = files;
            }
            model.set_touched(true);
            return;
        }

        info!("no simulation results present");
        if self.current.task_version != 1 {
            self.current.set_task(&task_name, 1);
            model.set_touched(true);
        }
    }

    /// Returns false if the snapshot directory could not be read.
    fn open_recorded(&mut self, model: &mut ResultModel, report: &mut OpenReport) -> bool {
        let task_dir = self.current.task_dir();
        let scan = match self.scan_current() {
            Ok(scan) => scan,
            Err(err) => {
                warn!(dir = %task_dir.display(), %err, "failed to read result directory, no results loaded");
                report.warnings.push(err.to_string());
                return false;
            }
        };

        let rec = reconcile(&self.current, &scan.state);
        if rec.unchanged() {
            info!(
                dir = %task_dir.display(),
                count = self.current.file_count(),
                "loading results"
            );
        }

        let superseded = superseded_files(&rec.lost, &scan);
        if !superseded.is_empty() {
            warn!(
                dir = %task_dir.display(),
                count = superseded.len(),
                "recorded result files belong to an older sub-task version"
            );
            self.current.remove_files(&superseded);
            report.superseded = superseded;
            model.set_touched(true);
        }
        let lost = diff(&rec.lost, &report.superseded);
        if !lost.is_empty() {
            let message = if task_dir.is_dir() {
                "result files listed in the model are missing from the result database"
            } else {
                "result directory referred to by the model does not exist"
            };
            warn!(dir = %task_dir.display(), count = lost.len(), "{message}");
            for file in &lost {
                debug!(file = %file.display(), "missing result file");
            }
            report
                .warnings
                .push(format!("{message}: {}", task_dir.display()));
            self.current.remove_files(&lost);
            report.lost = lost;
            model.set_touched(true);
        }

        let fresh = diff(&rec.adopted, &self.current.ignored_file_names());
        if !fresh.is_empty() {
            warn!(
                dir = %task_dir.display(),
                count = fresh.len(),
                "result files on disk are not listed in the model"
            );
            let adopt = self.policy.adopt(&AdoptionPrompt {
                task_dir: &task_dir,
                files: &fresh,
                obsolete: &scan.obsolete,
                abandoned: false,
            });
            if adopt {
                self.current.add_files(&fresh);
                report.adopted = fresh;
            } else {
                info!(count = fresh.len(), "new result files ignored");
                report.warnings.push(format!(
                    "{} result file(s) in {} were not included",
                    fresh.len(),
                    task_dir.display()
                ));
                self.current.ignore_files(&fresh);
                report.ignored = fresh;
            }
            model.set_touched(true);
        }

        if !scan.obsolete.is_empty() {
            warn!(
                count = scan.obsolete.len(),
                "obsolete result files will be deleted on save"
            );
            for file in &scan.obsolete {
                debug!(file = %file.display(), "obsolete result file");
            }
            report.warnings.push(format!(
                "{} obsolete file(s) in {}",
                scan.obsolete.len(),
                task_dir.display()
            ));
        }
        report.obsolete = scan.obsolete;
        true
    }

    fn admit_on_open(&mut self, model: &mut ResultModel, report: &mut OpenReport) {
        if self.extractor.is_none() {
            return;
        }

        let mut candidates = Vec::new();
        if self.options.include_reducer_files {
            let reducer = loaded_reducer_files(model);
            self.reducer_files.extend(reducer.iter().cloned());
            candidates.extend(reducer);
        }
        let admitted = self.desired_admission(model);
        candidates.extend(admitted.iter().cloned());
        let candidates = filter_most_recent_only(candidates);

        let listing_root = if self.reducer_files.is_empty() {
            self.current.task_dir()
        } else {
            model.root().to_path_buf()
        };
        report.categories = CategoryReport::new(&listing_root, &candidates);
        report.categories.log();

        if !candidates.is_empty()
            && let Some(extractor) = self.extractor.as_mut()
            && !extractor.add_files(&candidates, true)
        {
            warn!(count = candidates.len(), "some result files could not be opened");
        }

        self.admitted = admitted.into_iter().collect();
        report.admitted = candidates;
    }

    /// Manifest result containers that pass admission, newest generation only.
    fn desired_admission(&self, model: &mut ResultModel) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for path in self.current.all_file_names(Some(RESULT_CONTAINER_EXT)) {
            if admit(&Candidate::for_path(&path, model)) {
                out.push(path);
            }
        }
        filter_most_recent_only(out)
    }

    fn scan_current(&self) -> EngineResult<DiskScan> {
        let current = &self.current;
        let outcome = scan_task_dir(&current.task_dir(), &current.task_name, current.task_version)?;
        Ok(outcome.into_scan(current.base_path(), &current.task_name, current.task_version))
    }

    // ---- sync -------------------------------------------------------------

    /// Reconciles the manifest with disk, then hands the extractor exactly
    /// the files whose admission changed.
    ///
    /// New files are merged unless they were declined before. A sync that
    /// finds nothing new makes no extractor calls.
    pub fn sync(&mut self, model: &mut ResultModel, options: SyncOptions) -> EngineResult<SyncReport> {
        self.require_open("sync")?;
        let (report, _) = self.sync_with_disk(model, options)?;
        Ok(report)
    }

    fn sync_with_disk(
        &mut self,
        model: &mut ResultModel,
        options: SyncOptions,
    ) -> EngineResult<(SyncReport, DiskScan)> {
        let scan = self.scan_current()?;
        let rec = reconcile(&self.current, &scan.state);
        let mut report = SyncReport::default();

        let superseded = superseded_files(&rec.lost, &scan);
        if !superseded.is_empty() {
            info!(
                dir = %self.current.task_dir().display(),
                count = superseded.len(),
                "dropping result files of an older sub-task version"
            );
            self.current.remove_files(&superseded);
            report.superseded = superseded;
        }
        let lost = diff(&rec.lost, &report.superseded);
        if !lost.is_empty() {
            warn!(
                dir = %self.current.task_dir().display(),
                count = lost.len(),
                "result files have disappeared from disk"
            );
            self.current.remove_files(&lost);
            report.lost = lost;
        }

        let adopted = diff(&rec.adopted, &self.current.ignored_file_names());
        report.skipped = diff(&rec.adopted, &adopted);
        if !adopted.is_empty() {
            info!(count = adopted.len(), "adding new result files");
            self.current.add_files(&adopted);
            report.adopted = adopted;
        }

        if !report.unchanged() {
            model.set_touched(true);
            self.state = LifecycleState::Dirty;
        } else if self.state == LifecycleState::Open {
            self.state = LifecycleState::Synced;
        }
        report.obsolete = scan.obsolete.clone();

        if options.update_extractor {
            self.update_admission(model, &mut report);
        }
        if options.add_res_files {
            self.poll_res_files(&mut report);
        }
        Ok((report, scan))
    }

    fn update_admission(&mut self, model: &mut ResultModel, report: &mut SyncReport) {
        if self.extractor.is_none() {
            return;
        }

        let desired: FileSet = self.desired_admission(model).into_iter().collect();
        let to_add: Vec<PathBuf> = diff(&desired, &self.admitted).into_iter().collect();
        let to_remove: Vec<PathBuf> = diff(&self.admitted, &desired).into_iter().collect();

        if let Some(extractor) = self.extractor.as_mut() {
            if !to_add.is_empty() && !extractor.add_files(&to_add, false) {
                warn!(count = to_add.len(), "some result files could not be opened");
            }
            if !to_remove.is_empty() {
                extractor.remove_files(&to_remove);
            }
        }

        self.admitted = desired;
        report.added.extend(to_add);
        report.removed.extend(to_remove);
    }

    fn poll_res_files(&mut self, report: &mut SyncReport) {
        let Some(extractor) = self.extractor.as_mut() else {
            return;
        };
        let fresh: Vec<PathBuf> = self
            .current
            .all_file_names(Some(SOLVER_LOG_EXT))
            .into_iter()
            .filter(|file| {
                !self.polled_res_files.contains(file) && extractor.result_container(file).is_none()
            })
            .collect();
        if fresh.is_empty() {
            return;
        }
        if !extractor.add_files(&fresh, false) {
            warn!(count = fresh.len(), "some solver logs could not be opened");
        }
        self.polled_res_files.extend(fresh.iter().cloned());
        report.added.extend(fresh);
    }

    /// Unloads the solver logs loaded by polling syncs.
    pub fn remove_polled_res_files(&mut self) {
        let polled: Vec<PathBuf> = std::mem::take(&mut self.polled_res_files)
            .into_iter()
            .collect();
        if !polled.is_empty()
            && let Some(extractor) = self.extractor.as_mut()
        {
            extractor.remove_files(&polled);
        }
    }

    /// Re-evaluates admission after owners were loaded or unloaded.
    pub fn sync_on_owners(&mut self, model: &mut ResultModel) -> EngineResult<SyncReport> {
        self.require_open("sync owners")?;
        for owner in model.owners() {
            debug!(owner = %owner.id_name(), loaded = owner.loaded, "owner load state");
        }

        let mut report = SyncReport::default();
        if self.options.include_reducer_files {
            let desired: FileSet = loaded_reducer_files(model).into_iter().collect();
            let to_add: Vec<PathBuf> = diff(&desired, &self.reducer_files).into_iter().collect();
            let to_remove: Vec<PathBuf> = diff(&self.reducer_files, &desired).into_iter().collect();
            if let Some(extractor) = self.extractor.as_mut() {
                if !to_add.is_empty() {
                    extractor.add_files(&to_add, true);
                }
                if !to_remove.is_empty() {
                    extractor.remove_files(&to_remove);
                }
                self.reducer_files = desired;
                report.added.extend(to_add);
                report.removed.extend(to_remove);
            }
        }
        self.update_admission(model, &mut report);
        Ok(report)
    }

    /// Rescans the reduction results of one owner, optionally after they
    /// moved to `new_dir` (a `<task>_<version>` directory). Returns false if
    /// the owner has no reduction results at all.
    pub fn sync_owner(
        &mut self,
        model: &mut ResultModel,
        id: OwnerId,
        new_dir: Option<&Path>,
    ) -> EngineResult<bool> {
        self.require_open("sync owner")?;
        let owner = model.owner(id).ok_or(EngineError::OwnerNotFound(id))?;
        let loaded = owner.loaded;
        let Some(mut reducer) = owner
            .reducer
            .clone()
            .or_else(|| new_dir.map(|_| Manifest::default()))
        else {
            return Ok(false);
        };
        let old_files = reducer.all_file_names(Some(RESULT_CONTAINER_EXT));

        if let Some(dir) = new_dir {
            let name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let decoded = decode_task_dir(&name);
            let Some(version) = decoded.version else {
                return Err(EngineError::InvalidInput(format!(
                    "not a task directory: {}",
                    dir.display()
                )));
            };
            reducer.clear();
            reducer.set_task(&decoded.task_name, version);
            reducer.set_path(dir.parent().unwrap_or(Path::new("")));
        }

        let base = reducer.base_path().to_path_buf();
        let scan = scan_task_dir(&reducer.task_dir(), &reducer.task_name, reducer.task_version)?
            .into_scan(&base, &reducer.task_name, reducer.task_version);
        if !scan.has_results() && old_files.is_empty() {
            return Ok(false);
        }

        let mut reducer = scan.state;
        reducer.set_path(base);
        let new_files = if loaded {
            reducer.all_file_names(Some(RESULT_CONTAINER_EXT))
        } else {
            FileSet::new()
        };
        if let Some(owner) = model.owner_mut(id) {
            owner.reducer = Some(reducer);
        }
        model.set_touched(true);

        if new_dir.is_some() {
            model.enable_files(&old_files);
        }
        if !self.options.include_reducer_files {
            return Ok(true);
        }

        let dropped: Vec<PathBuf> = diff(&old_files, &new_files)
            .into_iter()
            .filter(|file| self.reducer_files.remove(file))
            .collect();
        let added: Vec<PathBuf> = diff(&new_files, &self.reducer_files)
            .into_iter()
            .filter(|file| model.is_enabled(file))
            .collect();

        if let Some(extractor) = self.extractor.as_mut() {
            if !dropped.is_empty() {
                extractor.remove_files(&dropped);
            }
            if !added.is_empty() {
                info!(owner = %id, count = added.len(), "reading reducer results");
                extractor.add_files(&added, true);
            }
            self.reducer_files.extend(added);
        }
        Ok(true)
    }

    // ---- save -------------------------------------------------------------

    /// Commits the current generation.
    ///
    /// Syncs first, so files written by an external process since the last
    /// sync are caught. Then deletes obsolete files and files the manifest
    /// does not list, and removes every other generation directory of the
    /// task that the manifest does not reference.
    pub fn save(&mut self, model: &mut ResultModel) -> EngineResult<SaveReport> {
        self.require_open("save")?;
        let (sync, scan) = self.sync_with_disk(model, SyncOptions::default())?;
        if !sync.unchanged() {
            warn!(
                dir = %self.current.task_dir().display(),
                "stored manifest differed from disk, saving the disk state"
            );
        }

        let mut report = SaveReport::default();
        let extra = diff(&scan.state.all_file_names(None), &self.current.all_file_names(None));
        for file in union(&scan.obsolete, &extra) {
            if fsops::delete_file(&file) {
                report.deleted.insert(file);
            } else {
                report.failed.insert(file);
            }
        }
        if !report.deleted.is_empty() {
            info!(count = report.deleted.len(), "deleted obsolete result files");
            fsops::prune_empty_dirs(&self.current.task_dir());
        }

        let current_version = self.current.task_version;
        self.remove_task_dirs(|version| version == current_version, &mut report.removed_dirs);

        self.current.clear_ignored();
        self.initial = self.current.clone();
        self.state = LifecycleState::Synced;
        report.sync = sync;
        Ok(report)
    }

    /// Removes the `<task>_<version>` directories under the result root whose
    /// version is not kept and which the manifest does not reference. The
    /// root itself goes too once nothing is left in it.
    fn remove_task_dirs(&self, keep: impl Fn(u32) -> bool, removed: &mut Vec<PathBuf>) {
        let root = self.current.base_path();
        let dirs = match SnapshotStore::new(root).list_task_dirs(&self.current.task_name) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(root = %root.display(), %err, "failed to list result directories");
                return;
            }
        };

        let referenced = self.current.all_dir_names();
        let listed = dirs.len();
        let mut count = 0;
        for entry in dirs {
            let Some(version) = entry.dir.version else {
                continue;
            };
            if keep(version) || referenced.contains(&entry.path) {
                continue;
            }
            if fsops::remove_dir(&entry.path) {
                debug!(dir = %entry.path.display(), "removed result directory");
                removed.push(entry.path);
                count += 1;
            }
        }
        if listed > 0 && count == listed {
            fsops::remove_dir_if_empty(root);
        }
    }

    /// Copies the current generation to `new_root` as generation 1 and moves
    /// the model there. The old location is closed with pruning. Disabled
    /// entries follow their files. Ends closed; reopen to continue.
    pub fn save_as(&mut self, model: &mut ResultModel, new_root: &Path) -> EngineResult<SaveAsReport> {
        self.require_open("save as")?;
        let old_dir = self.current.task_dir();

        let mut fresh = self.current.clone();
        fresh.clear_ignored();
        fresh.set_task(&self.current.task_name, 1);
        fresh.set_path(new_root);
        let new_dir = fresh.task_dir();
        // pruning the old location would also hit the copies
        if same_location(self.current.base_path(), new_root) {
            return Err(EngineError::InvalidInput(format!(
                "Results are already stored in {}",
                new_root.display()
            )));
        }

        let mut report = SaveAsReport::default();
        let mut still_disabled = Vec::new();
        for file in self.current.all_file_names(None) {
            let Ok(rel) = file.strip_prefix(&old_dir) else {
                continue;
            };
            let target = new_dir.join(rel);
            if !same_location(&file, &target)
                && fsops::is_file(&file)
                && fsops::copy_file(&file, &target)
            {
                if model.enable_file(&file) {
                    still_disabled.push(target.clone());
                }
                report.copied.insert(target);
            } else {
                fresh.remove_files([&target]);
                report.failed.insert(file);
            }
        }
        info!(
            from = %old_dir.display(),
            to = %new_dir.display(),
            count = report.copied.len(),
            "copied result files"
        );

        report.close = self.close(model, true)?;
        model.set_root(new_root);
        for target in &still_disabled {
            model.disable_file(target);
        }
        self.initial = fresh.clone();
        self.current = fresh;
        Ok(report)
    }

    // ---- increment --------------------------------------------------------

    /// Starts a new generation for the next solve. The old generation stays
    /// on disk until the next save. Returns the new version.
    pub fn increment(&mut self, model: &mut ResultModel) -> EngineResult<u32> {
        self.require_open("increment")?;
        let files = self.current.all_file_names(None);
        model.enable_files(&files);
        self.current.increment_version();
        model.set_touched(true);
        self.release(false);
        self.state = LifecycleState::Dirty;
        info!(
            dir = %self.current.task_dir().display(),
            "starting new result generation"
        );
        Ok(self.current.task_version)
    }

    /// Drops everything the extractor holds, keeping reducer files unless
    /// `reducer_files_too`.
    pub fn release(&mut self, reducer_files_too: bool) {
        if reducer_files_too {
            self.reducer_files.clear();
        }
        if let Some(extractor) = self.extractor.as_mut() {
            extractor.renew(&self.reducer_files);
        }
        self.admitted.clear();
        self.polled_res_files.clear();
    }

    // ---- close ------------------------------------------------------------

    /// Releases the extractor and the ownership index. With `prune`, files
    /// neither the saved nor the current manifest lists are deleted, along
    /// with the generation directories strictly between the two.
    pub fn close(&mut self, model: &mut ResultModel, prune: bool) -> EngineResult<CloseReport> {
        self.require_open("close")?;
        model.invalidate_ownership();
        if let Some(extractor) = self.extractor.as_mut() {
            extractor.clear();
        }
        self.admitted.clear();
        self.reducer_files.clear();
        self.polled_res_files.clear();
        self.state = LifecycleState::Closed;

        let mut report = CloseReport::default();
        if prune && self.current.base_path().is_dir() {
            self.prune_unsaved(&mut report);
        }
        Ok(report)
    }

    fn prune_unsaved(&self, report: &mut CloseReport) {
        let keep = union(
            &self.initial.all_file_names(None),
            &self.current.all_file_names(None),
        );

        let mut scanned = FileSet::new();
        for manifest in [&self.initial, &self.current] {
            let dir = manifest.task_dir();
            if !scanned.insert(dir.clone()) {
                continue;
            }
            let scan = match scan_task_dir(&dir, &manifest.task_name, manifest.task_version) {
                Ok(ScanOutcome::Scanned(scan)) => scan,
                Ok(ScanOutcome::NoResultsYet) => continue,
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "skipping unreadable result directory");
                    continue;
                }
            };
            let before = report.deleted.len();
            for file in diff(&scan.state.all_file_names(None), &keep) {
                if fsops::delete_file(&file) {
                    report.deleted.insert(file);
                } else {
                    report.failed.insert(file);
                }
            }
            if report.deleted.len() > before {
                fsops::prune_empty_dirs(&dir);
            }
        }

        let (saved, current) = (self.initial.task_version, self.current.task_version);
        self.remove_task_dirs(
            |version| version <= saved || version >= current,
            &mut report.removed_dirs,
        );
    }

    // ---- file management --------------------------------------------------

    /// Enables or disables result files. Disabled files stay in the manifest
    /// and on disk; they are only withheld from the extractor. Returns how
    /// many registry entries changed.
    pub fn set_files_enabled(
        &mut self,
        model: &mut ResultModel,
        files: &FileSet,
        enable: bool,
    ) -> EngineResult<usize> {
        self.require_open("change file state")?;
        let mut changed = 0;

        if enable {
            let mut to_add = Vec::new();
            for file in files {
                if model.enable_file(file) {
                    changed += 1;
                }
                if has_extension(file, RESULT_CONTAINER_EXT)
                    && !self.admitted.contains(file)
                    && admit(&Candidate::for_path(file, model))
                {
                    to_add.push(file.clone());
                }
            }
            if !to_add.is_empty()
                && let Some(extractor) = self.extractor.as_mut()
            {
                extractor.add_files(&to_add, false);
                self.admitted.extend(to_add);
            }
        } else {
            let mut to_remove = Vec::new();
            for file in files {
                if model.disable_file(file) {
                    changed += 1;
                }
                let held = self.admitted.remove(file);
                if self.reducer_files.remove(file) || held {
                    to_remove.push(file.clone());
                }
            }
            if !to_remove.is_empty()
                && let Some(extractor) = self.extractor.as_mut()
            {
                extractor.remove_files(&to_remove);
            }
        }
        Ok(changed)
    }

    /// Removes files from the manifest, the extractor and disk.
    pub fn remove_result_files(
        &mut self,
        model: &mut ResultModel,
        files: &FileSet,
    ) -> EngineResult<RemovalReport> {
        self.require_open("remove files")?;
        if files.is_empty() {
            return Ok(RemovalReport::default());
        }
        self.current.remove_files(files);
        let report = self.forget_files(model, files);
        // left on disk, so keep the next sync from adopting them again
        self.current.ignore_files(&report.failed);
        Ok(report)
    }

    /// Removes the results of one sub-task group, optionally only those of
    /// one owner. The group's record moves to its next version.
    pub fn remove_results(
        &mut self,
        model: &mut ResultModel,
        group: &str,
        owner: Option<OwnerId>,
    ) -> EngineResult<RemovalReport> {
        self.require_open("remove results")?;
        let id_name = match owner {
            Some(id) => Some(model.owner(id).ok_or(EngineError::OwnerNotFound(id))?.id_name()),
            None => None,
        };

        let Some(node) = self.current.sub_task_mut(group) else {
            info!(group, "no results in memory");
            return Ok(RemovalReport::default());
        };
        let node = match &id_name {
            Some(name) => match node.sub_task_mut(name) {
                Some(sub) => sub,
                None => {
                    info!(group, owner = %name, "no results in memory");
                    return Ok(RemovalReport::default());
                }
            },
            None => node,
        };
        let dir = node.task_dir();
        let files = node.all_file_names(None);
        node.increment_version();

        let report = self.forget_files(model, &files);
        if dir.is_dir() && !fsops::remove_dir(&dir) {
            warn!(dir = %dir.display(), "failed to remove result directory");
        }
        Ok(report)
    }

    /// Deletes result containers left empty by an aborted solve.
    pub fn purge_truncated_files(&mut self, model: &mut ResultModel) -> EngineResult<RemovalReport> {
        self.require_open("purge truncated files")?;
        let truncated: FileSet = self
            .current
            .all_file_names(Some(RESULT_CONTAINER_EXT))
            .into_iter()
            .filter(|file| fsops::file_size(file) == Some(0))
            .collect();
        if truncated.is_empty() {
            return Ok(RemovalReport::default());
        }
        info!(count = truncated.len(), "removing empty result files");
        self.remove_result_files(model, &truncated)
    }

    /// Deletes every file of the current generation once the policy confirms.
    /// Returns false if declined or if any file could not be deleted.
    pub fn remove_all_files(&mut self, model: &mut ResultModel) -> EngineResult<bool> {
        self.require_open("remove all files")?;
        let files = self.current.all_file_names(None);
        if files.is_empty() {
            return Ok(true);
        }
        if !self.policy.confirm_overwrite(files.len()) {
            info!(count = files.len(), "keeping existing results");
            return Ok(false);
        }
        let report = self.remove_result_files(model, &files)?;
        Ok(report.failed.is_empty())
    }

    fn forget_files(&mut self, model: &mut ResultModel, files: &FileSet) -> RemovalReport {
        model.enable_files(files);
        model.set_touched(true);
        self.state = LifecycleState::Dirty;

        let held: Vec<PathBuf> = files
            .iter()
            .filter(|file| {
                let admitted = self.admitted.remove(*file);
                let polled = self.polled_res_files.remove(*file);
                admitted || polled
            })
            .cloned()
            .collect();
        if !held.is_empty()
            && let Some(extractor) = self.extractor.as_mut()
        {
            extractor.remove_files(&held);
        }

        let mut report = RemovalReport::default();
        for file in files {
            if fsops::delete_file(file) {
                report.removed.insert(file.clone());
            } else {
                report.failed.insert(file.clone());
            }
        }
        report
    }

    // ---- queries ----------------------------------------------------------

    /// Whether any result container is recorded, in the whole tree or in one
    /// sub-task group.
    pub fn has_results(&self, group: Option<&str>) -> bool {
        let node = match group {
            Some(group) => self.current.sub_task(group),
            None => Some(&self.current),
        };
        node.is_some_and(|node| !node.all_file_names(Some(RESULT_CONTAINER_EXT)).is_empty())
    }

    /// Positions the extractor at the sample nearest `time`.
    pub fn position_at(&mut self, time: f64) -> Option<f64> {
        self.extractor.as_mut()?.position_rdb(time)
    }
}

/// Recorded files that are still on disk but were classified obsolete.
fn superseded_files(lost: &FileSet, scan: &DiskScan) -> FileSet {
    lost.intersection(&scan.obsolete).cloned().collect()
}

/// True when both paths name the same place on disk. Paths that do not
/// exist yet are compared as written.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn loaded_reducer_files(model: &ResultModel) -> Vec<PathBuf> {
    model
        .owners()
        .iter()
        .filter(|owner| owner.loaded)
        .filter_map(|owner| owner.reducer.as_ref())
        .flat_map(|reducer| reducer.all_file_names(Some(RESULT_CONTAINER_EXT)))
        .filter(|file| fsops::is_file(file) && model.is_enabled(file))
        .collect()
}
