// Error taxonomy for the navigation subsystem.
//
// Nothing here is fatal to a game session. A bad index is a caller bug
// surfaced as a value instead of memory corruption; a bad `.nav` file
// degrades to "no navigation data"; a refused save is a user-facing warning.
// A missing `.nav` file and an unreachable path target are *not* errors and
// never appear here (see `LoadOutcome::Missing` and `find_path` -> `None`).

use crate::types::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("{index} is out of range (graph has {count} nodes)")]
    InvalidIndex { index: NodeId, count: usize },

    #[error("nav file has invalid format (magic {found:#010x})")]
    BadMagic { found: i32 },

    #[error("nav file is out of date (version {found}, expected {expected})")]
    VersionMismatch { found: i32, expected: i32 },

    #[error("nav file is malformed: {0}")]
    Malformed(String),

    #[error("saving nodes requires authoring mode")]
    SaveNotPermitted,

    #[error("no nodes to write")]
    NothingToSave,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type NavResult<T> = Result<T, NavError>;
