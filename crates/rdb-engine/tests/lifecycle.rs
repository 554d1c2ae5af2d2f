use std::fs;
use std::path::{Path, PathBuf};

use rdb_core::{FileSet, OwnerId};
use rdb_engine::{
    BatchPolicy, EngineError, ExtractorCall, InteractivePolicy, LifecycleState, MemoryExtractor, Owner,
    ResultModel, SnapshotLifecycle, SyncOptions,
};
use rdb_manifest::Manifest;

fn write(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"results").unwrap();
}

fn set(paths: &[&PathBuf]) -> FileSet {
    paths.iter().map(|p| (*p).clone()).collect()
}

fn recorded(root: &Path, files: &[&PathBuf]) -> Manifest {
    let mut manifest = Manifest::new("response", 1).with_path(root);
    manifest.add_files(files.iter().copied());
    manifest
}

fn batch(manifest: Manifest, extractor: &MemoryExtractor) -> SnapshotLifecycle {
    SnapshotLifecycle::new(manifest, BatchPolicy).with_extractor(extractor.clone())
}

#[test]
fn solve_disable_save_close() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    fs::create_dir_all(&root).unwrap();
    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(Manifest::default(), &extractor);

    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(lifecycle.manifest().task_version, 1);
    assert!(report.admitted.is_empty());
    assert!(extractor.calls().is_empty());

    // the solver writes a result file
    let file = root.join("response_1/timehist_prim_1.frs");
    write(&file);

    let sync = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert_eq!(sync.adopted, set(&[&file]));
    assert!(lifecycle.manifest().contains(&file));
    assert_eq!(
        extractor.take_calls(),
        vec![ExtractorCall::Add {
            paths: vec![file.clone()],
            reducer_group: false
        }]
    );
    assert_eq!(lifecycle.state(), LifecycleState::Dirty);

    lifecycle
        .set_files_enabled(&mut model, &set(&[&file]), false)
        .unwrap();
    assert!(!model.is_enabled(&file));
    assert!(lifecycle.manifest().contains(&file));
    assert_eq!(
        extractor.take_calls(),
        vec![ExtractorCall::Remove {
            paths: vec![file.clone()]
        }]
    );

    let sync = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert!(sync.unchanged());
    assert!(extractor.take_calls().is_empty());

    let save = lifecycle.save(&mut model).unwrap();
    assert!(save.deleted.is_empty());
    assert!(file.is_file());
    assert_eq!(lifecycle.state(), LifecycleState::Synced);
    assert!(lifecycle.initial_manifest().contains(&file));

    lifecycle.close(&mut model, true).unwrap();
    assert!(file.is_file());
    assert_eq!(extractor.take_calls(), vec![ExtractorCall::Clear]);
    assert_eq!(lifecycle.state(), LifecycleState::Closed);
}

#[test]
fn repeated_sync_without_changes_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(Manifest::default(), &extractor);
    lifecycle.open(&mut model).unwrap();

    write(&root.join("response_1/timehist_prim_1.frs"));
    lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    extractor.take_calls();

    let again = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert!(again.unchanged());
    assert!(again.added.is_empty() && again.removed.is_empty());
    assert!(extractor.calls().is_empty());
}

#[test]
fn abandoned_results_are_adopted_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let newest = root.join("response_2/timehist_prim_1.frs");
    let older = root.join("response_1/timehist_prim_1.frs");
    write(&newest);
    write(&older);

    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = SnapshotLifecycle::new(Manifest::default(), InteractivePolicy::accept_all())
        .with_extractor(extractor.clone());

    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(report.adopted, set(&[&newest]));
    assert_eq!(lifecycle.manifest().task_version, 2);
    assert!(model.is_touched());
    assert_eq!(
        extractor.calls(),
        vec![ExtractorCall::Add {
            paths: vec![newest.clone()],
            reducer_group: true
        }]
    );

    let save = lifecycle.save(&mut model).unwrap();
    assert_eq!(save.removed_dirs, vec![root.join("response_1")]);
    assert!(newest.is_file());
    assert!(!older.exists());
}

#[test]
fn declined_abandoned_results_start_a_new_generation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let stale = root.join("response_2/timehist_prim_1.frs");
    write(&stale);
    write(&root.join("response_1/timehist_prim_1.frs"));

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(Manifest::default(), BatchPolicy);

    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(report.ignored, set(&[&stale]));
    assert!(!report.warnings.is_empty());
    assert_eq!(lifecycle.manifest().task_version, 3);
    assert!(lifecycle.manifest().is_empty());

    let save = lifecycle.save(&mut model).unwrap();
    assert_eq!(save.removed_dirs.len(), 2);
    assert!(!root.join("response_1").exists());
    assert!(!root.join("response_2").exists());
}

#[test]
fn open_reconciles_a_recorded_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let kept = root.join("response_1/timehist_prim_1.frs");
    let lost = root.join("response_1/timehist_sec_1.frs");
    let extra = root.join("response_1/eigval_1.frs");
    write(&kept);
    write(&extra);

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&kept, &lost]), BatchPolicy);

    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(report.lost, set(&[&lost]));
    assert_eq!(report.ignored, set(&[&extra]));
    assert!(model.is_touched());
    assert_eq!(lifecycle.manifest().all_file_names(None), set(&[&kept]));

    // a declined file is not merged by later syncs
    let sync = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert!(sync.unchanged());
    assert_eq!(sync.skipped, set(&[&extra]));

    let save = lifecycle.save(&mut model).unwrap();
    assert_eq!(save.deleted, set(&[&extra]));
    assert!(!extra.exists());
    assert!(lifecycle.manifest().ignored_file_names().is_empty());
}

#[test]
fn obsolete_files_are_deleted_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let live = root.join("response_1/3_wing_2/timehist_rcy_1.frs");
    let stale = root.join("response_1/3_wing_1/timehist_rcy_1.frs");
    let junk = root.join("response_1/notes.txt");
    for file in [&live, &stale, &junk] {
        write(file);
    }

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&live]), BatchPolicy);
    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(report.obsolete, set(&[&stale, &junk]));

    let save = lifecycle.save(&mut model).unwrap();
    assert_eq!(save.deleted, set(&[&stale, &junk]));
    assert!(live.is_file());
    assert!(!root.join("response_1/3_wing_1").exists());
}

#[test]
fn increment_is_monotonic_and_clears_disabled_entries() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let file = root.join("response_1/timehist_prim_1.frs");
    write(&file);

    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(recorded(&root, &[&file]), &extractor);
    lifecycle.open(&mut model).unwrap();
    lifecycle
        .set_files_enabled(&mut model, &set(&[&file]), false)
        .unwrap();
    extractor.take_calls();

    assert_eq!(lifecycle.increment(&mut model).unwrap(), 2);
    assert!(model.is_enabled(&file));
    assert!(model.disabled().is_empty());
    assert!(lifecycle.manifest().is_empty());
    assert_eq!(lifecycle.state(), LifecycleState::Dirty);
    assert_eq!(
        extractor.take_calls(),
        vec![ExtractorCall::Renew { retained: vec![] }]
    );

    // an empty generation still moves on
    assert_eq!(lifecycle.increment(&mut model).unwrap(), 3);

    // the previous generation survives until the next save
    assert!(file.is_file());
    lifecycle.save(&mut model).unwrap();
    assert!(!root.join("response_1").exists());
}

#[test]
fn close_with_prune_drops_unsaved_generations() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let saved = root.join("response_1/timehist_prim_1.frs");
    write(&saved);

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&saved]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    lifecycle.increment(&mut model).unwrap();
    let abandoned = root.join("response_2/timehist_prim_1.frs");
    write(&abandoned);
    lifecycle.increment(&mut model).unwrap();
    let unsaved = root.join("response_3/timehist_prim_1.frs");
    write(&unsaved);

    let report = lifecycle.close(&mut model, true).unwrap();
    assert!(saved.is_file());
    assert!(!unsaved.exists());
    assert!(report.deleted.contains(&unsaved));
    assert_eq!(report.removed_dirs, vec![root.join("response_2")]);
}

#[test]
fn close_without_prune_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(Manifest::default(), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    let unsaved = root.join("response_1/timehist_prim_1.frs");
    write(&unsaved);
    let report = lifecycle.close(&mut model, false).unwrap();
    assert!(report.deleted.is_empty());
    assert!(unsaved.is_file());
}

#[test]
fn owner_load_state_gates_admission() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let prim = root.join("response_1/timehist_prim_1.frs");
    let stress = root.join("response_1/3_wing_1/timehist_rcy_1.frs");
    let gage = root.join("response_1/3_wing_1/timehist_gage_rcy_1.frs");
    for file in [&prim, &stress, &gage] {
        write(file);
    }

    let wing = OwnerId::new(3).unwrap();
    let mut model = ResultModel::new(&root);
    model.add_owner(Owner::new(wing, "wing"));

    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(recorded(&root, &[&prim, &stress, &gage]), &extractor);
    let report = lifecycle.open(&mut model).unwrap();
    assert_eq!(report.admitted.len(), 2);
    assert!(extractor.is_loaded(&prim));
    assert!(extractor.is_loaded(&gage));
    assert!(!extractor.is_loaded(&stress));

    model.set_owner_loaded(wing, true).unwrap();
    let sync = lifecycle.sync_on_owners(&mut model).unwrap();
    assert_eq!(sync.added, vec![stress.clone()]);
    assert!(extractor.is_loaded(&stress));

    model.set_owner_loaded(wing, false).unwrap();
    let sync = lifecycle.sync_on_owners(&mut model).unwrap();
    assert_eq!(sync.removed, vec![stress.clone()]);
    assert!(!extractor.is_loaded(&stress));
    assert!(extractor.is_loaded(&gage));
}

#[test]
fn only_the_newest_stamped_generation_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(Manifest::default(), &extractor);
    lifecycle.open(&mut model).unwrap();

    let first = root.join("response_1/timehist_prim_2023-JAN-01_000000.frs");
    let second = root.join("response_1/timehist_prim_2023-JAN-02_000000.frs");
    write(&first);
    write(&second);
    lifecycle.sync(&mut model, SyncOptions::default()).unwrap();

    assert_eq!(lifecycle.manifest().file_count(), 2);
    assert!(extractor.is_loaded(&second));
    assert!(!extractor.is_loaded(&first));
}

#[test]
fn solver_logs_are_polled_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let mut model = ResultModel::new(&root);
    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(Manifest::default(), &extractor);
    lifecycle.open(&mut model).unwrap();

    let log = root.join("response_1/dynamics_solver.res");
    write(&log);
    let polling = SyncOptions {
        update_extractor: true,
        add_res_files: true,
    };
    let first = lifecycle.sync(&mut model, polling).unwrap();
    assert_eq!(first.added, vec![log.clone()]);
    let second = lifecycle.sync(&mut model, polling).unwrap();
    assert!(second.added.is_empty());

    lifecycle.remove_polled_res_files();
    assert!(!extractor.is_loaded(&log));
}

#[test]
fn remove_results_of_one_owner() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let wing_file = root.join("response_1/event_2/3_wing_1/timehist_rcy_1.frs");
    let event_file = root.join("response_1/event_2/timehist_prim_1.frs");
    write(&wing_file);
    write(&event_file);

    let wing = OwnerId::new(3).unwrap();
    let mut model = ResultModel::new(&root);
    model.add_owner(Owner::new(wing, "wing"));
    let mut lifecycle =
        SnapshotLifecycle::new(recorded(&root, &[&wing_file, &event_file]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();
    assert!(lifecycle.has_results(Some("event")));

    let report = lifecycle
        .remove_results(&mut model, "event", Some(wing))
        .unwrap();
    assert_eq!(report.removed, set(&[&wing_file]));
    assert!(!root.join("response_1/event_2/3_wing_1").exists());
    assert!(event_file.is_file());

    let event = lifecycle.manifest().sub_task("event").unwrap();
    assert_eq!(event.sub_task("3_wing").unwrap().task_version, 2);
    assert!(lifecycle.has_results(Some("event")));

    let missing = OwnerId::new(9).unwrap();
    assert!(lifecycle.remove_results(&mut model, "event", Some(missing)).is_err());
}

#[test]
fn truncated_files_are_purged() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let good = root.join("response_1/timehist_prim_1.frs");
    let empty = root.join("response_1/timehist_sec_1.frs");
    write(&good);
    fs::write(&empty, b"").unwrap();

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&good, &empty]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    let report = lifecycle.purge_truncated_files(&mut model).unwrap();
    assert_eq!(report.removed, set(&[&empty]));
    assert!(!empty.exists());
    assert!(!lifecycle.manifest().contains(&empty));
    assert!(lifecycle.manifest().contains(&good));
}

#[test]
fn remove_all_files_needs_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let file = root.join("response_1/timehist_prim_1.frs");
    write(&file);

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&file]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();
    assert!(!lifecycle.remove_all_files(&mut model).unwrap());
    assert!(file.is_file());

    let mut lifecycle =
        SnapshotLifecycle::new(recorded(&root, &[&file]), InteractivePolicy::accept_all());
    lifecycle.open(&mut model).unwrap();
    assert!(lifecycle.remove_all_files(&mut model).unwrap());
    assert!(!file.exists());
    assert!(!lifecycle.has_results(None));
}

#[test]
fn save_as_moves_results_and_disabled_entries() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let prim = root.join("response_2/timehist_prim_1.frs");
    let stress = root.join("response_2/3_wing_1/timehist_rcy_1.frs");
    write(&prim);
    write(&stress);

    let mut model = ResultModel::new(&root);
    let mut manifest = Manifest::new("response", 2).with_path(&root);
    manifest.add_files([&prim, &stress]);
    let mut lifecycle = SnapshotLifecycle::new(manifest, BatchPolicy);
    lifecycle.open(&mut model).unwrap();
    lifecycle
        .set_files_enabled(&mut model, &set(&[&prim]), false)
        .unwrap();

    let new_root = dir.path().join("copy/results");
    let report = lifecycle.save_as(&mut model, &new_root).unwrap();
    let new_prim = new_root.join("response_1/timehist_prim_1.frs");
    let new_stress = new_root.join("response_1/3_wing_1/timehist_rcy_1.frs");
    assert_eq!(report.copied, set(&[&new_prim, &new_stress]));
    assert!(new_prim.is_file() && new_stress.is_file());

    assert_eq!(model.root(), new_root.as_path());
    assert!(!model.is_enabled(&new_prim));
    assert!(model.is_enabled(&prim));
    assert_eq!(lifecycle.state(), LifecycleState::Closed);
    assert_eq!(lifecycle.manifest().task_dir(), new_root.join("response_1"));

    // the old model's results stay where they were
    assert!(prim.is_file());

    let reopened = lifecycle.open(&mut model).unwrap();
    assert!(reopened.lost.is_empty() && reopened.adopted.is_empty());
}

#[test]
fn reducer_results_follow_their_owner() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let reducer_dir = dir.path().join("parts/wing_RDB/reducer_1");
    let reduced = reducer_dir.join("link_DB/wing_red.frs");
    write(&reduced);

    let wing = OwnerId::new(3).unwrap();
    let mut model = ResultModel::new(&root);
    let mut owner = Owner::new(wing, "wing");
    owner.loaded = true;
    model.add_owner(owner);

    let extractor = MemoryExtractor::new();
    let mut lifecycle = batch(Manifest::default(), &extractor);
    lifecycle.open(&mut model).unwrap();

    assert!(lifecycle.sync_owner(&mut model, wing, Some(&reducer_dir)).unwrap());
    assert!(lifecycle.reducer_files().contains(&reduced));
    assert_eq!(
        extractor.take_calls(),
        vec![ExtractorCall::Add {
            paths: vec![reduced.clone()],
            reducer_group: true
        }]
    );
    let stored = model.owner(wing).unwrap().reducer.as_ref().unwrap();
    assert_eq!(stored.task_dir(), reducer_dir);

    // rescanning an unchanged reducer is silent
    assert!(lifecycle.sync_owner(&mut model, wing, None).unwrap());
    assert!(extractor.take_calls().is_empty());

    // increment keeps reducer files loaded
    lifecycle.increment(&mut model).unwrap();
    assert!(extractor.is_loaded(&reduced));
    lifecycle.release(true);
    assert!(!extractor.is_loaded(&reduced));
}

#[test]
fn unreadable_state_errors_name_the_operation() {
    let mut model = ResultModel::new("/nowhere/results");
    let mut lifecycle = SnapshotLifecycle::new(Manifest::default(), BatchPolicy);
    let err = lifecycle.save(&mut model).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot save while the result database is empty"
    );
}

#[test]
fn save_as_onto_the_current_generation_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(Manifest::default(), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    let file = root.join("response_1/timehist_prim_1.frs");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"results").unwrap();
    lifecycle.sync(&mut model, SyncOptions::default()).unwrap();

    for target in [root.clone(), root.join(".")] {
        let err = lifecycle.save_as(&mut model, &target).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
    assert_eq!(fs::read(&file).unwrap(), b"results");
    assert!(lifecycle.manifest().contains(&file));
    assert_eq!(lifecycle.state(), LifecycleState::Dirty);
    assert_eq!(model.root(), root.as_path());
}

#[test]
fn undeletable_removed_files_are_not_adopted_again() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let file = root.join("response_1/timehist_prim_1.frs");
    write(&file);

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&file]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    // a directory in its place cannot be removed as a file
    fs::remove_file(&file).unwrap();
    fs::create_dir(&file).unwrap();
    let report = lifecycle
        .remove_result_files(&mut model, &set(&[&file]))
        .unwrap();
    assert_eq!(report.failed, set(&[&file]));
    assert!(!lifecycle.manifest().contains(&file));
    assert!(lifecycle.manifest().ignored_file_names().contains(&file));

    // the file is still there on the next sync
    fs::remove_dir(&file).unwrap();
    write(&file);
    let sync = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert!(sync.adopted.is_empty());
    assert_eq!(sync.skipped, set(&[&file]));
    assert!(!lifecycle.manifest().contains(&file));

    // save retries the delete
    let save = lifecycle.save(&mut model).unwrap();
    assert!(save.deleted.contains(&file));
    assert!(!file.exists());
}

#[test]
fn superseded_sub_task_files_are_not_reported_lost() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let old = root.join("response_1/3_wing_1/timehist_rcy_1.frs");
    let new = root.join("response_1/3_wing_2/timehist_rcy_1.frs");
    write(&old);

    let mut model = ResultModel::new(&root);
    let mut lifecycle = SnapshotLifecycle::new(recorded(&root, &[&old]), BatchPolicy);
    lifecycle.open(&mut model).unwrap();

    // the solver writes the next generation of the wing's results
    write(&new);
    let sync = lifecycle.sync(&mut model, SyncOptions::default()).unwrap();
    assert_eq!(sync.superseded, set(&[&old]));
    assert!(sync.lost.is_empty());
    assert_eq!(sync.adopted, set(&[&new]));
    assert!(sync.obsolete.contains(&old));
    assert_eq!(
        lifecycle.manifest().sub_task("3_wing").unwrap().task_version,
        2
    );
    assert!(old.is_file());
}
