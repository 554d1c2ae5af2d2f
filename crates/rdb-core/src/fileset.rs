//! Ordered path sets: the vocabulary every reconciliation step is written in.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Lexicographically ordered set of file paths.
pub type FileSet = BTreeSet<PathBuf>;

/// `a \ b`
pub fn diff(a: &FileSet, b: &FileSet) -> FileSet {
    a.difference(b).cloned().collect()
}

/// `a ∪ b`
pub fn union(a: &FileSet, b: &FileSet) -> FileSet {
    a.union(b).cloned().collect()
}

/// Keeps the members of `set` whose extension equals `extension` (case-insensitive).
pub fn with_extension(set: &FileSet, extension: &str) -> FileSet {
    set.iter()
        .filter(|path| has_extension(path, extension))
        .cloned()
        .collect()
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Best-effort relative name of `path` under `root`, as shown in listings.
pub fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
