use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::QuarantineMover;
use crate::verify::is_tool_artifact;
use crate::Config;

/// Enumerate the media files of the target directory, non-recursively.
///
/// Subdirectories (including the quarantine folder), hidden files, and the
/// metadata tool's `_original` backups are skipped. Zero-length files carry
/// no usable content and are routed to quarantine right away.
pub fn list_media_files(
    dir: &Path,
    config: &Config,
    mover: &dyn QuarantineMover,
) -> Result<Vec<PathBuf>> {
    let meta = fs::metadata(dir).map_err(|_| Error::InvalidDirectory(dir.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(Error::InvalidDirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut empty = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat entry, skipping");
                continue;
            }
        };
        if meta.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            warn!(path = %path.display(), "non-UTF-8 filename, skipping");
            continue;
        };
        if name.starts_with('.') || is_tool_artifact(&path) {
            continue;
        }
        if meta.len() == 0 {
            empty.push(path);
            continue;
        }
        files.push(path);
    }

    if !empty.is_empty() {
        info!(count = empty.len(), "quarantining zero-length files");
        mover.move_all(&empty, &dir.join(&config.quarantine_folder));
    }

    files.sort();
    Ok(files)
}
