//! Identifier strings embedded in result file and directory names.
//!
//! Snapshot directories are named `<taskName>_<version>`, owner scoped
//! directories and files carry `<ownerId>_<baseName>`, and time stamped file
//! generations end with `_YYYY-MND-DD_hhmmss.ext`. Everything here is pure.

use chrono::NaiveDateTime;

use crate::OwnerId;

/// Length of the time stamp window `YYYY-MND-DD_hhmmss.ext` at the end of a name.
pub const TIMESTAMP_WINDOW: usize = 22;

const TIMESTAMP_FORMAT: &str = "%Y-%b-%d_%H%M%S";

/// A decoded `<taskName>_<version>` directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDir {
    pub task_name: String,
    /// `None` when the name carries no numeric version suffix.
    pub version: Option<u32>,
}

impl TaskDir {
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }
}

/// `"<ownerId>_<baseName>"`, the key owning components are known by in paths.
pub fn encode_owner_id_name(owner_id: OwnerId, base_name: &str) -> String {
    format!("{}_{}", owner_id, base_name)
}

pub fn encode_task_dir(task_name: &str, version: u32) -> String {
    format!("{}_{}", task_name, version)
}

/// Splits `<taskName>_<version>`.
///
/// The name is versioned only if everything after the last `_` is digits.
/// Otherwise the whole string is the task name.
pub fn decode_task_dir(name: &str) -> TaskDir {
    if let Some(pos) = name.rfind('_') {
        let suffix = &name[pos + 1..];
        if !suffix.is_empty()
            && suffix.bytes().all(|b| b.is_ascii_digit())
            && let Ok(version) = suffix.parse::<u32>()
        {
            return TaskDir {
                task_name: name[..pos].to_string(),
                version: Some(version),
            };
        }
    }

    TaskDir {
        task_name: name.to_string(),
        version: None,
    }
}

/// Removes a trailing solve-task id `_<digits>` from a name, if present.
pub fn strip_solve_task_id(name: &str) -> &str {
    match name.rfind('_') {
        Some(pos)
            if pos + 1 < name.len() && name[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &name[..pos]
        }
        _ => name,
    }
}

fn is_separator(b: u8) -> bool {
    b == b'/' || b == b'\\'
}

fn is_timestamp_window(window: &[u8]) -> bool {
    // YYYY-MND-DD_hhmmss.ext
    window.len() == TIMESTAMP_WINDOW
        && window[..4].iter().all(u8::is_ascii_digit)
        && window[4] == b'-'
        && window[5..8].iter().all(u8::is_ascii_alphabetic)
        && window[8] == b'-'
        && window[9..11].iter().all(u8::is_ascii_digit)
        && window[11] == b'_'
        && window[12..18].iter().all(u8::is_ascii_digit)
        && window[18] == b'.'
        && window[19..].iter().all(|b| b.is_ascii() && !is_separator(*b) && *b != b'.')
}

/// Returns the logical key of a time stamped file generation.
///
/// The key is the path without its trailing `YYYY-MND-DD_hhmmss.ext` window
/// (the `_` in front of the stamp is kept). Returns `None` when the final path
/// segment is shorter than 23 characters, when a path separator falls inside
/// the window, or when the window does not have the stamp shape.
pub fn strip_timestamp_suffix(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();
    if bytes.len() < TIMESTAMP_WINDOW + 1 {
        return None;
    }

    let segment_start = bytes
        .iter()
        .rposition(|b| is_separator(*b))
        .map(|pos| pos + 1)
        .unwrap_or(0);
    if bytes.len() - segment_start < TIMESTAMP_WINDOW + 1 {
        return None;
    }

    let split = bytes.len() - TIMESTAMP_WINDOW;
    if bytes[split - 1] != b'_' || !is_timestamp_window(&bytes[split..]) {
        return None;
    }

    Some(&path[..split])
}

/// `"_YYYY-MND-DD_hhmmss"` for a generation written at `at`.
pub fn encode_timestamp_suffix(at: &NaiveDateTime) -> String {
    format!("_{}", at.format(TIMESTAMP_FORMAT)).to_uppercase()
}

/// Parses the generation time out of a time stamped path.
pub fn parse_timestamp_suffix(path: &str) -> Option<NaiveDateTime> {
    let key = strip_timestamp_suffix(path)?;
    let window = &path[key.len()..];
    let stamp = window.split('.').next()?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}
