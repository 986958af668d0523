use std::path::PathBuf;

use thiserror::Error;

use crate::session::TaskId;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session store at {} is corrupt: {source}", .path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize session store: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Line is not a task: {0:?}")]
    NotATaskLine(String),
    #[error("Task line already carries identifier {existing}")]
    IdentifierPresent { existing: TaskId },
    #[error("Line {line} is out of range (document has {len} lines)")]
    LineOutOfRange { line: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, TrackError>;
