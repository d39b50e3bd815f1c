//! Error types for directory watching.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from establishing a directory watch.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Failed to start worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
