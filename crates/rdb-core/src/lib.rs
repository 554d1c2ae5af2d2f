//! rdb-core: stable foundation for the result database engine.
//!
//! Contains:
//! - codec (identifier strings embedded in file and directory names)
//! - fileset (ordered path sets and the diff/union vocabulary)
//! - category (result file classification by name markers)
//! - ids (owner ids for owning components)
//! - error (shared error types)

pub mod category;
pub mod codec;
pub mod error;
pub mod fileset;
pub mod ids;

// Re-exports: nice ergonomics for downstream crates
pub use category::*;
pub use codec::*;
pub use error::{CoreError, CoreResult};
pub use fileset::*;
pub use ids::*;

/// Task name used for the top level result database.
pub const DEFAULT_TASK_NAME: &str = "response";
