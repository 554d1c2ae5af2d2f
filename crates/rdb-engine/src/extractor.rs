//! The live read index result files are handed to once admitted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rdb_core::FileSet;

/// Handle of an open result container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

/// Read index over the admitted result files of one open model.
///
/// The engine only ever adds, removes and renews by path; what a container
/// holds is up to the implementation.
pub trait Extractor {
    /// Opens `paths`. `is_reducer_group` marks one logical batch that is
    /// indexed together. Returns false if any file could not be opened.
    fn add_files(&mut self, paths: &[PathBuf], is_reducer_group: bool) -> bool;

    fn remove_files(&mut self, paths: &[PathBuf]) -> bool;

    /// Moves the read position to the sample nearest `time`, returning it.
    fn position_rdb(&mut self, time: f64) -> Option<f64>;

    fn result_container(&self, path: &Path) -> Option<ContainerId>;

    /// Drops every container except those for `retained`.
    fn renew(&mut self, retained: &FileSet);

    fn clear(&mut self);
}

/// Record of one call made on a [`MemoryExtractor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorCall {
    Add {
        paths: Vec<PathBuf>,
        reducer_group: bool,
    },
    Remove {
        paths: Vec<PathBuf>,
    },
    Renew {
        retained: Vec<PathBuf>,
    },
    Clear,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: BTreeMap<PathBuf, ContainerId>,
    next_id: u64,
    times: Vec<f64>,
    calls: Vec<ExtractorCall>,
}

/// Thread-safe in-memory extractor that records every call.
///
/// Clones share state, so a caller can keep a handle while the lifecycle
/// owns a boxed copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample times [`Extractor::position_rdb`] snaps to.
    pub fn with_times(times: Vec<f64>) -> Self {
        let extractor = Self::new();
        extractor.lock().times = times;
        extractor
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<ExtractorCall> {
        self.lock().calls.clone()
    }

    /// Drains the call log.
    pub fn take_calls(&self) -> Vec<ExtractorCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn loaded(&self) -> Vec<PathBuf> {
        self.lock().containers.keys().cloned().collect()
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.lock().containers.contains_key(path)
    }
}

impl Extractor for MemoryExtractor {
    fn add_files(&mut self, paths: &[PathBuf], is_reducer_group: bool) -> bool {
        let mut state = self.lock();
        for path in paths {
            if !state.containers.contains_key(path) {
                let id = ContainerId(state.next_id);
                state.next_id += 1;
                state.containers.insert(path.clone(), id);
            }
        }
        state.calls.push(ExtractorCall::Add {
            paths: paths.to_vec(),
            reducer_group: is_reducer_group,
        });
        true
    }

    fn remove_files(&mut self, paths: &[PathBuf]) -> bool {
        let mut state = self.lock();
        for path in paths {
            state.containers.remove(path);
        }
        state.calls.push(ExtractorCall::Remove {
            paths: paths.to_vec(),
        });
        true
    }

    fn position_rdb(&mut self, time: f64) -> Option<f64> {
        self.lock()
            .times
            .iter()
            .copied()
            .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
    }

    fn result_container(&self, path: &Path) -> Option<ContainerId> {
        self.lock().containers.get(path).copied()
    }

    fn renew(&mut self, retained: &FileSet) {
        let mut state = self.lock();
        state.containers.retain(|path, _| retained.contains(path));
        state.calls.push(ExtractorCall::Renew {
            retained: retained.iter().cloned().collect(),
        });
    }

    fn clear(&mut self) {
        let mut state = self.lock();
        state.containers.clear();
        state.calls.push(ExtractorCall::Clear);
    }
}
