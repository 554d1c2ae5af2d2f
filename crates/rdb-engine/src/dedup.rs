//! Keeps only the newest generation of time stamped result files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rdb_core::{LINK_DB_MARKER, strip_timestamp_suffix};
use tracing::debug;

/// Logical key a file's generations share, or `None` if it is always kept.
fn generation_key(path: &Path) -> Option<String> {
    let name = path.to_string_lossy();
    if name.contains(LINK_DB_MARKER) {
        return None;
    }
    strip_timestamp_suffix(&name).map(str::to_string)
}

/// Drops superseded generations of time stamped files.
///
/// Files sharing a key (the path minus its `YYYY-MND-DD_hhmmss.ext` window)
/// are generations of the same result; only the lexicographically greatest
/// one survives. Files without a time stamp, or under a linked-database
/// directory, pass through. Input order is preserved.
pub fn filter_most_recent_only(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let keys: Vec<Option<String>> = paths.iter().map(|p| generation_key(p)).collect();

    let mut newest: HashMap<&str, usize> = HashMap::new();
    for (idx, key) in keys.iter().enumerate() {
        let Some(key) = key else { continue };
        newest
            .entry(key.as_str())
            .and_modify(|best| {
                if paths[idx].as_os_str() > paths[*best].as_os_str() {
                    *best = idx;
                }
            })
            .or_insert(idx);
    }

    let mut kept = Vec::with_capacity(paths.len());
    for (idx, path) in paths.into_iter().enumerate() {
        match keys[idx].as_deref() {
            Some(key) if newest.get(key) != Some(&idx) => {
                debug!(path = %path.display(), "not loading superseded result file");
            }
            _ => kept.push(path),
        }
    }
    kept
}
