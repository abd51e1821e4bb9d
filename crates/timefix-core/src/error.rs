use std::path::PathBuf;

use thiserror::Error;

/// Error kinds for the reconciliation pipeline.
///
/// Only `InvalidDirectory` is fatal to a run; everything else is a per-file
/// condition that is logged and excluded from the current batch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a directory: {0}")]
    InvalidDirectory(PathBuf),

    #[error("metadata read failed for {path}: {message}")]
    MetadataRead { path: PathBuf, message: String },

    #[error("metadata write failed for {path}: {message}")]
    MetadataWrite { path: PathBuf, message: String },

    #[error("rename conflict for {path}: {message}")]
    RenameConflict { path: PathBuf, message: String },

    #[error("external call timed out after {}s: {command}", .timeout.as_secs())]
    Timeout {
        command: String,
        timeout: std::time::Duration,
    },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
