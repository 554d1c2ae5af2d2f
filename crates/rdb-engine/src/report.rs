//! Per-category summary of the files handed to the extractor.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rdb_core::{FileCategory, relative_name};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryReport {
    groups: BTreeMap<FileCategory, Vec<String>>,
}

impl CategoryReport {
    /// Groups `files` by category, listing them relative to `root`.
    pub fn new(root: &Path, files: &[PathBuf]) -> Self {
        let mut groups: BTreeMap<FileCategory, Vec<String>> = BTreeMap::new();
        for path in files {
            let rel = relative_name(root, path);
            groups
                .entry(FileCategory::classify(&rel))
                .or_default()
                .push(rel);
        }
        Self { groups }
    }

    pub fn count(&self, category: FileCategory) -> usize {
        self.groups.get(&category).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn files(&self, category: FileCategory) -> &[String] {
        self.groups.get(&category).map_or(&[], Vec::as_slice)
    }

    pub fn log(&self) {
        for category in FileCategory::ALL {
            let files = self.files(category);
            if files.is_empty() {
                continue;
            }
            info!(category = %category, count = files.len(), "reading result files");
            for file in files {
                debug!(%file, "result file");
            }
        }
    }
}

impl fmt::Display for CategoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for category in FileCategory::ALL {
            let files = self.files(category);
            if files.is_empty() {
                continue;
            }
            writeln!(f, "Reading {} files:", category.label())?;
            for file in files {
                writeln!(f, "  {}", file)?;
            }
        }
        Ok(())
    }
}
