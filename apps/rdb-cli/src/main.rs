use clap::{Parser, Subcommand};
use rdb_core::{FileSet, OwnerId, RESULT_CONTAINER_EXT};
use rdb_engine::{
    BatchPolicy, EngineResult, InteractivePolicy, OpenReport, ResultModel, SnapshotLifecycle,
    SyncOptions, filter_most_recent_only,
};
use rdb_manifest::ModelFile;
use rdb_store::{ScanOutcome, scan_task_dir};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rdb-cli")]
#[command(about = "Result database maintenance for simulation models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the recorded state of a model's result database
    Status {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
    },
    /// Scan a snapshot directory without a model
    Scan {
        /// The `<task>_<version>` directory to scan
        dir: PathBuf,
        /// Expected task name
        #[arg(long, default_value = rdb_core::DEFAULT_TASK_NAME)]
        task: String,
        /// Expected task version
        #[arg(long, default_value_t = 1)]
        version: u32,
    },
    /// Open the result database and reconcile it with disk
    Open {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Include result files the model does not list instead of ignoring them
        #[arg(long)]
        adopt: bool,
    },
    /// Merge result files written since the last save
    Sync {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Also pick up solver progress logs
        #[arg(long)]
        res: bool,
        /// Include result files the model does not list instead of ignoring them
        #[arg(long)]
        adopt: bool,
    },
    /// Commit the current generation and delete everything else
    Save {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
    },
    /// Copy the current generation to a new result root
    SaveAs {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// New result root directory
        new_root: PathBuf,
    },
    /// Start a new result generation
    Increment {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
    },
    /// Close the result database
    Close {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Delete files the model never saved
        #[arg(long)]
        prune: bool,
    },
    /// Exclude result files from loading
    Disable {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Files, relative to the result root or absolute
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Include previously disabled result files again
    Enable {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Files, relative to the result root or absolute
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete result files from the model and disk
    Remove {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Files, relative to the result root or absolute
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete the results of one sub-task group
    RemoveResults {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
        /// Sub-task name, e.g. `event`
        group: String,
        /// Only the results of this owner
        #[arg(long)]
        owner: Option<u32>,
    },
    /// Delete empty result containers left by an aborted solve
    PurgeTruncated {
        /// Path to the model file (YAML or JSON)
        model_path: PathBuf,
    },
    /// Print which of the given files survive newest-generation filtering
    Dedup {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> EngineResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status { model_path } => cmd_status(&model_path),
        Commands::Scan { dir, task, version } => cmd_scan(&dir, &task, version),
        Commands::Open { model_path, adopt } => cmd_open(&model_path, adopt),
        Commands::Sync {
            model_path,
            res,
            adopt,
        } => cmd_sync(&model_path, res, adopt),
        Commands::Save { model_path } => cmd_save(&model_path),
        Commands::SaveAs {
            model_path,
            new_root,
        } => cmd_save_as(&model_path, &new_root),
        Commands::Increment { model_path } => cmd_increment(&model_path),
        Commands::Close { model_path, prune } => cmd_close(&model_path, prune),
        Commands::Disable { model_path, files } => cmd_set_enabled(&model_path, &files, false),
        Commands::Enable { model_path, files } => cmd_set_enabled(&model_path, &files, true),
        Commands::Remove { model_path, files } => cmd_remove(&model_path, &files),
        Commands::RemoveResults {
            model_path,
            group,
            owner,
        } => cmd_remove_results(&model_path, &group, owner),
        Commands::PurgeTruncated { model_path } => cmd_purge_truncated(&model_path),
        Commands::Dedup { paths } => cmd_dedup(paths),
    }
}

/// A model file opened headless with nothing loaded. Unlisted result files
/// are ignored unless the session adopts them.
struct Session {
    path: PathBuf,
    file: ModelFile,
    model: ResultModel,
    lifecycle: SnapshotLifecycle,
    opened: OpenReport,
}

impl Session {
    fn load(path: &Path, adopt: bool) -> EngineResult<Self> {
        let file = rdb_manifest::load_model(path)?;
        let model = ResultModel::from_model_file(&file);
        let manifest = file.results.clone();
        let lifecycle = if adopt {
            SnapshotLifecycle::new(manifest, InteractivePolicy::new(|_| true))
        } else {
            SnapshotLifecycle::new(manifest, BatchPolicy)
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
            model,
            lifecycle,
            opened: OpenReport::default(),
        })
    }

    fn open(path: &Path) -> EngineResult<Self> {
        Self::open_with(path, false)
    }

    fn open_with(path: &Path, adopt: bool) -> EngineResult<Self> {
        let mut session = Self::load(path, adopt)?;
        session.opened = session.lifecycle.open(&mut session.model)?;
        for warning in &session.opened.warnings {
            println!("! {}", warning);
        }
        Ok(session)
    }

    fn resolve(&self, files: &[PathBuf]) -> FileSet {
        files
            .iter()
            .map(|file| {
                if file.is_absolute() {
                    file.clone()
                } else {
                    self.model.root().join(file)
                }
            })
            .collect()
    }

    /// Writes the model file back if anything it stores changed.
    fn finish(mut self, force: bool) -> EngineResult<()> {
        if !force && !self.model.is_touched() {
            return Ok(());
        }
        self.file.results = self.lifecycle.manifest().clone();
        self.model.store_into(&mut self.file);
        rdb_manifest::save_model(&self.path, &self.file)?;
        println!("✓ Model saved: {}", self.path.display());
        Ok(())
    }
}

fn cmd_status(model_path: &Path) -> EngineResult<()> {
    let session = Session::load(model_path, false)?;
    let manifest = session.lifecycle.manifest();

    println!("Model: {}", session.file.name);
    println!("Result root: {}", session.model.root().display());
    println!(
        "Current generation: {} ({} files)",
        manifest.task_dir().display(),
        manifest.file_count()
    );
    for (category, files) in manifest.files_by_category() {
        println!("  {}: {}", category, files.len());
    }
    if !session.model.disabled().is_empty() {
        println!("Disabled files:");
        for file in session.model.disabled().iter() {
            println!("  {}", file);
        }
    }
    if !session.model.owners().is_empty() {
        println!("Owners:");
        for owner in session.model.owners() {
            let state = if owner.loaded { "loaded" } else { "not loaded" };
            println!("  {} ({})", owner.id_name(), state);
        }
    }
    Ok(())
}

fn cmd_scan(dir: &Path, task: &str, version: u32) -> EngineResult<()> {
    match scan_task_dir(dir, task, version)? {
        ScanOutcome::NoResultsYet => println!("No results yet: {}", dir.display()),
        ScanOutcome::Scanned(scan) => {
            let live = scan.state.all_file_names(None);
            println!("Live files ({}):", live.len());
            for file in &live {
                println!("  {}", file.display());
            }
            if !scan.obsolete.is_empty() {
                println!("Obsolete files ({}):", scan.obsolete.len());
                for file in &scan.obsolete {
                    println!("  {}", file.display());
                }
            }
        }
    }
    Ok(())
}

fn cmd_open(model_path: &Path, adopt: bool) -> EngineResult<()> {
    let session = Session::open_with(model_path, adopt)?;
    let manifest = session.lifecycle.manifest();
    println!(
        "✓ Opened {} ({} files, {} containers)",
        manifest.task_dir().display(),
        manifest.file_count(),
        manifest.all_file_names(Some(RESULT_CONTAINER_EXT)).len()
    );
    session.finish(false)
}

fn cmd_sync(model_path: &Path, res: bool, adopt: bool) -> EngineResult<()> {
    let mut session = Session::open_with(model_path, adopt)?;
    let options = SyncOptions {
        update_extractor: false,
        add_res_files: res,
    };
    let report = session.lifecycle.sync(&mut session.model, options)?;
    let added = session.opened.adopted.len() + report.adopted.len();
    let lost = session.opened.lost.len() + report.lost.len();
    if added == 0 && lost == 0 {
        println!("✓ Manifest matches disk");
    } else {
        println!("✓ Synced: {} added, {} lost", added, lost);
    }
    if !session.opened.ignored.is_empty() {
        println!(
            "! {} unlisted files ignored, pass --adopt to include them",
            session.opened.ignored.len()
        );
    }
    session.finish(false)
}

fn cmd_save(model_path: &Path) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let report = session.lifecycle.save(&mut session.model)?;
    println!(
        "✓ Saved: {} files deleted, {} directories removed",
        report.deleted.len(),
        report.removed_dirs.len()
    );
    for file in &report.failed {
        println!("! Could not delete {}", file.display());
    }
    session.finish(true)
}

fn cmd_save_as(model_path: &Path, new_root: &Path) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let report = session.lifecycle.save_as(&mut session.model, new_root)?;
    println!(
        "✓ Copied {} files to {}",
        report.copied.len(),
        new_root.display()
    );
    for file in &report.failed {
        println!("! Could not copy {}", file.display());
    }
    session.finish(true)
}

fn cmd_increment(model_path: &Path) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let version = session.lifecycle.increment(&mut session.model)?;
    println!("✓ New result generation: {}", version);
    session.finish(true)
}

fn cmd_close(model_path: &Path, prune: bool) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let report = session.lifecycle.close(&mut session.model, prune)?;
    if prune {
        println!(
            "✓ Closed: {} unsaved files deleted, {} directories removed",
            report.deleted.len(),
            report.removed_dirs.len()
        );
    } else {
        println!("✓ Closed");
    }
    session.finish(false)
}

fn cmd_set_enabled(model_path: &Path, files: &[PathBuf], enable: bool) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let files = session.resolve(files);
    let changed = session
        .lifecycle
        .set_files_enabled(&mut session.model, &files, enable)?;
    let verb = if enable { "Enabled" } else { "Disabled" };
    println!("✓ {} {} files", verb, changed);
    session.finish(false)
}

fn cmd_remove(model_path: &Path, files: &[PathBuf]) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let files = session.resolve(files);
    let report = session
        .lifecycle
        .remove_result_files(&mut session.model, &files)?;
    println!("✓ Removed {} files", report.removed.len());
    for file in &report.failed {
        println!("! Could not delete {}", file.display());
    }
    session.finish(false)
}

fn cmd_remove_results(model_path: &Path, group: &str, owner: Option<u32>) -> EngineResult<()> {
    let owner = owner.map(OwnerId::new).transpose()?;
    let mut session = Session::open(model_path)?;
    let report = session
        .lifecycle
        .remove_results(&mut session.model, group, owner)?;
    println!("✓ Removed {} files of {}", report.removed.len(), group);
    session.finish(false)
}

fn cmd_purge_truncated(model_path: &Path) -> EngineResult<()> {
    let mut session = Session::open(model_path)?;
    let report = session
        .lifecycle
        .purge_truncated_files(&mut session.model)?;
    if report.removed.is_empty() {
        println!("✓ No truncated result files");
    } else {
        println!("✓ Removed {} truncated files", report.removed.len());
    }
    session.finish(false)
}

fn cmd_dedup(mut paths: Vec<PathBuf>) -> EngineResult<()> {
    paths.sort();
    for path in filter_most_recent_only(paths) {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdb_manifest::Manifest;
    use std::fs;

    fn write(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"results").unwrap();
    }

    /// Writes a model file whose first generation lists `recorded`.
    fn model_with(dir: &Path, recorded: &[PathBuf]) -> PathBuf {
        let mut file = ModelFile::new("wing");
        let mut manifest = Manifest::new("response", 1).with_path(dir.join("results"));
        manifest.add_files(recorded);
        file.results = manifest;
        let path = dir.join("wing.yaml");
        rdb_manifest::save_model(&path, &file).unwrap();
        path
    }

    #[test]
    fn sync_leaves_unlisted_files_out_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let prim = dir.path().join("results/response_1/timehist_prim_1.frs");
        let sec = dir.path().join("results/response_1/timehist_sec_1.frs");
        write(&prim);
        let path = model_with(dir.path(), &[prim.clone()]);
        write(&sec);

        cmd_sync(&path, false, false).unwrap();

        let file = rdb_manifest::load_model(&path).unwrap();
        assert!(file.results.contains(&prim));
        assert!(!file.results.contains(&sec));
        assert!(file.results.ignored_file_names().contains(&sec));
    }

    #[test]
    fn sync_with_adopt_merges_unlisted_files() {
        let dir = tempfile::tempdir().unwrap();
        let prim = dir.path().join("results/response_1/timehist_prim_1.frs");
        let sec = dir.path().join("results/response_1/timehist_sec_1.frs");
        write(&prim);
        let path = model_with(dir.path(), &[prim.clone()]);
        write(&sec);

        cmd_sync(&path, false, true).unwrap();

        let file = rdb_manifest::load_model(&path).unwrap();
        assert!(file.results.contains(&prim));
        assert!(file.results.contains(&sec));
        assert!(sec.is_file());
    }

    #[test]
    fn sync_with_adopt_picks_up_an_unrecorded_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_with(dir.path(), &[]);
        let prim = dir.path().join("results/response_3/timehist_prim_1.frs");
        write(&prim);

        cmd_sync(&path, false, true).unwrap();

        let file = rdb_manifest::load_model(&path).unwrap();
        assert_eq!(file.results.task_version, 3);
        assert!(file.results.contains(&prim));
    }
}
