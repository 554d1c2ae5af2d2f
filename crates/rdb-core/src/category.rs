//! Result file classification by name markers.

use std::fmt;
use std::path::Path;

/// Result containers loaded into the live read index.
pub const RESULT_CONTAINER_EXT: &str = "frs";

/// Solver progress logs, only loaded while polling a running process.
pub const SOLVER_LOG_EXT: &str = "res";

/// Extensions a result database is expected to hold.
pub const RESULT_EXTENSIONS: &[&str] = &["frs", "res", "fmx", "fsm", "fco", "fsi", "fsv", "fnd"];

/// Files under a reduced-part directory are never deduplicated.
pub const LINK_DB_MARKER: &str = "link_DB";

/// Strain rosette recovery results are admitted regardless of owner load state.
pub const GAGE_RECOVERY_MARKER: &str = "timehist_gage_rcy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FileCategory {
    PrimarySolver,
    SecondarySolver,
    Eigenvalue,
    FrequencyDomain,
    StressRecovery,
    ModeRecovery,
    GageRecovery,
    StrainCoatSummary,
    DutyCycle,
    /// Reducer output and generic matrix files.
    Generic,
}

const MARKERS: &[(&str, FileCategory)] = &[
    ("timehist_prim", FileCategory::PrimarySolver),
    ("timehist_sec", FileCategory::SecondarySolver),
    ("eigval_", FileCategory::Eigenvalue),
    ("freqdomain_", FileCategory::FrequencyDomain),
    ("timehist_rcy", FileCategory::StressRecovery),
    ("eigval_rcy", FileCategory::ModeRecovery),
    (GAGE_RECOVERY_MARKER, FileCategory::GageRecovery),
    ("summary_rcy", FileCategory::StrainCoatSummary),
    ("dutycycle_rcy", FileCategory::DutyCycle),
];

impl FileCategory {
    pub const ALL: [FileCategory; 10] = [
        FileCategory::Generic,
        FileCategory::PrimarySolver,
        FileCategory::SecondarySolver,
        FileCategory::Eigenvalue,
        FileCategory::FrequencyDomain,
        FileCategory::StressRecovery,
        FileCategory::ModeRecovery,
        FileCategory::GageRecovery,
        FileCategory::StrainCoatSummary,
        FileCategory::DutyCycle,
    ];

    /// Classifies a (relative) result file name. The longest matching marker wins.
    pub fn classify(name: &str) -> FileCategory {
        MARKERS
            .iter()
            .filter(|(marker, _)| name.contains(marker))
            .max_by_key(|(marker, _)| marker.len())
            .map(|(_, category)| *category)
            .unwrap_or(FileCategory::Generic)
    }

    /// Like [`FileCategory::classify`], but `None` for files a result
    /// database should not contain at all.
    pub fn classify_path(path: &Path) -> Option<FileCategory> {
        let ext = path.extension()?.to_str()?;
        if !RESULT_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
        {
            return None;
        }
        Some(Self::classify(&path.to_string_lossy()))
    }

    pub fn label(self) -> &'static str {
        match self {
            FileCategory::PrimarySolver => "Primary Time History",
            FileCategory::SecondarySolver => "Secondary Time History",
            FileCategory::Eigenvalue => "System Eigenmode",
            FileCategory::FrequencyDomain => "Frequency Domain",
            FileCategory::StressRecovery => "Stress Recovery",
            FileCategory::ModeRecovery => "Eigenmode Recovery",
            FileCategory::GageRecovery => "Strain Rosette Recovery",
            FileCategory::StrainCoatSummary => "Strain Coat Recovery",
            FileCategory::DutyCycle => "Duty Cycle",
            FileCategory::Generic => "Reducer",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
