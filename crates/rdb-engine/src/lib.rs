//! rdb-engine: keeps a model's result manifest consistent with disk.
//!
//! The engine reconciles the persisted [`rdb_manifest::Manifest`] with the
//! files that actually exist in the snapshot directories, decides which
//! result files are handed to the [`Extractor`], and drives the
//! open/sync/save/increment/close lifecycle of a result database.
//!
//! Frontends (the CLI, a GUI) only talk to [`SnapshotLifecycle`] and
//! [`ResultModel`]; prompting is delegated to an [`AdoptionPolicy`].

pub mod admission;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod model;
pub mod ownership;
pub mod policy;
pub mod reconcile;
pub mod report;

pub use admission::{Candidate, admit};
pub use dedup::filter_most_recent_only;
pub use error::{EngineError, EngineResult};
pub use extractor::{ContainerId, Extractor, ExtractorCall, MemoryExtractor};
pub use lifecycle::{
    CloseReport, LifecycleOptions, LifecycleState, OpenReport, RemovalReport, SaveAsReport,
    SaveReport, SnapshotLifecycle, SyncOptions, SyncReport,
};
pub use model::{DisabledFileRegistry, Owner, ResultModel};
pub use ownership::OwnershipIndex;
pub use policy::{AdoptionPolicy, AdoptionPrompt, BatchPolicy, InteractivePolicy};
pub use reconcile::{Reconciliation, reconcile, reconcile_sets};
pub use report::CategoryReport;
