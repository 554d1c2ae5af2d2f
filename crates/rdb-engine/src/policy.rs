//! How the engine asks before adopting or overwriting result files.

use std::fmt;
use std::path::Path;

use rdb_core::FileSet;

/// What a policy is asked to adopt.
#[derive(Debug, Clone, Copy)]
pub struct AdoptionPrompt<'a> {
    pub task_dir: &'a Path,
    pub files: &'a FileSet,
    pub obsolete: &'a FileSet,
    /// The whole directory is unknown to the model (left behind by an
    /// unsaved session), rather than a few extra files in a known one.
    pub abandoned: bool,
}

impl fmt::Display for AdoptionPrompt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.abandoned {
            writeln!(
                f,
                "The result directory {} contains {} result file(s) not referred to by the model.",
                self.task_dir.display(),
                self.files.len()
            )?;
        } else {
            writeln!(
                f,
                "{} result file(s) in {} are not listed in the model:",
                self.files.len(),
                self.task_dir.display()
            )?;
            for file in self.files {
                writeln!(f, "  {}", file.display())?;
            }
        }
        if !self.obsolete.is_empty() {
            writeln!(f, "{} obsolete file(s) will be deleted on save.", self.obsolete.len())?;
        }
        write!(f, "Include these results in the model?")
    }
}

/// Decisions a frontend makes on the engine's behalf.
pub trait AdoptionPolicy {
    /// Whether files found on disk become part of the model.
    fn adopt(&mut self, prompt: &AdoptionPrompt<'_>) -> bool;

    /// Whether `file_count` existing result files may be deleted.
    fn confirm_overwrite(&mut self, file_count: usize) -> bool;
}

/// Unattended runs: never adopt, never overwrite. The engine still logs
/// every discrepancy it declines to act on.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPolicy;

impl AdoptionPolicy for BatchPolicy {
    fn adopt(&mut self, _prompt: &AdoptionPrompt<'_>) -> bool {
        false
    }

    fn confirm_overwrite(&mut self, _file_count: usize) -> bool {
        false
    }
}

type AdoptFn = Box<dyn FnMut(&AdoptionPrompt<'_>) -> bool>;
type ConfirmFn = Box<dyn FnMut(usize) -> bool>;

/// Policy backed by callbacks, typically dialogs.
pub struct InteractivePolicy {
    adopt: AdoptFn,
    confirm: ConfirmFn,
}

impl InteractivePolicy {
    /// Overwrites are refused until [`InteractivePolicy::with_confirm`] says otherwise.
    pub fn new(adopt: impl FnMut(&AdoptionPrompt<'_>) -> bool + 'static) -> Self {
        Self {
            adopt: Box::new(adopt),
            confirm: Box::new(|_| false),
        }
    }

    pub fn with_confirm(mut self, confirm: impl FnMut(usize) -> bool + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn accept_all() -> Self {
        Self::new(|_| true).with_confirm(|_| true)
    }
}

impl fmt::Debug for InteractivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractivePolicy").finish_non_exhaustive()
    }
}

impl AdoptionPolicy for InteractivePolicy {
    fn adopt(&mut self, prompt: &AdoptionPrompt<'_>) -> bool {
        (self.adopt)(prompt)
    }

    fn confirm_overwrite(&mut self, file_count: usize) -> bool {
        (self.confirm)(file_count)
    }
}
