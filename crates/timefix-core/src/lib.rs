//! Reconciles a creation timestamp for media files from two unreliable
//! sources, embedded metadata tags and filename patterns, and enforces a
//! single canonical representation: a `yyyyMMdd_HHmmss` filename prefix with
//! matching metadata and filesystem attributes.

pub mod date;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod scan;
pub mod verify;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveTime};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::date::filename::Candidate;
use crate::date::validate::Interpretation;
use crate::gateway::{Collaborators, TagSelector};
use crate::reconcile::{FilenameOutcome, MetadataReading, ReconciledTimestamp};

pub use error::{Error, Result};
pub use reconcile::Origin;
pub use verify::{QuarantineDecision, QuarantineReason};

/// Immutable run configuration. Constructed once at startup and passed by
/// reference to every component; nothing reads ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tags treated as authoritative for "when was this captured".
    pub principal_tags: Vec<String>,
    /// Accepted input formats for raw metadata values, in priority order.
    /// Each is also tried with a trailing zone offset.
    pub metadata_parse_formats: Vec<String>,
    /// Canonical filename timestamp format.
    pub filename_format: String,
    /// Canonical format for metadata writes.
    pub metadata_format: String,
    /// Display format for filesystem attribute stamps.
    pub fs_attr_format: String,
    /// Separator between an injected timestamp prefix and the original name.
    pub partition: String,
    /// Folder under the target directory for files failing validation.
    pub quarantine_folder: String,
    /// Time of day used to complete a confirmed partial date.
    pub default_time: NaiveTime,
    /// Day of month used to complete a confirmed year-month.
    pub default_day: u32,
    /// Upper bound on the runtime of one external tool invocation.
    pub call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            principal_tags: vec![
                "DateTimeOriginal".to_string(),
                "CreateDate".to_string(),
                "MediaCreateDate".to_string(),
            ],
            metadata_parse_formats: vec![
                "%Y:%m:%d %H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
            ],
            filename_format: "%Y%m%d_%H%M%S".to_string(),
            metadata_format: "%Y:%m:%d %H:%M:%S".to_string(),
            fs_attr_format: "%m/%d/%Y %H:%M:%S".to_string(),
            partition: "__".to_string(),
            quarantine_folder: "quarantine".to_string(),
            default_time: NaiveTime::from_hms_opt(0, 1, 0).unwrap(),
            default_day: 1,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn is_principal(&self, tag: &str) -> bool {
        self.principal_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// The three pipeline modes. The set is closed and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Metadata is the reference: resolve from principal tags, optionally
    /// fall back to an interactive choice among secondary tags.
    ExifReference { rename: bool, treat_secondary: bool },
    /// The filename is the reference: extract, validate, and complete a
    /// timestamp from the name, then stamp it back onto the file.
    FilenameReference { treat_exif: bool },
    /// Cross-check filename prefixes against principal metadata and move
    /// failures to the quarantine folder.
    ValidateOnly,
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub files_seen: u64,
    pub resolved: u64,
    pub written: u64,
    pub renamed: u64,
    pub skipped: u64,
    pub quarantined: u64,
    pub failures: u64,
}

/// Run one mode over a directory. Per-file problems are logged and skipped;
/// only an invalid target directory aborts the run.
pub fn run(mode: Mode, dir: &Path, config: &Config, ext: &Collaborators) -> Result<RunSummary> {
    match mode {
        Mode::ExifReference { rename, treat_secondary } => {
            run_exif_reference(dir, config, ext, rename, treat_secondary)
        }
        Mode::FilenameReference { treat_exif } => {
            run_filename_reference(dir, config, ext, treat_exif)
        }
        Mode::ValidateOnly => run_validate(dir, config, ext),
    }
}

enum PrincipalOutcome {
    Resolved(ReconciledTimestamp),
    NoPrincipal(Vec<MetadataReading>),
    ReadFailed,
}

fn run_exif_reference(
    dir: &Path,
    config: &Config,
    ext: &Collaborators,
    rename: bool,
    treat_secondary: bool,
) -> Result<RunSummary> {
    let files = scan::list_media_files(dir, config, ext.mover)?;
    let mut summary = RunSummary {
        files_seen: files.len() as u64,
        ..RunSummary::default()
    };

    // Principal resolution is independent per file; fan the reads out and
    // collect one outcome per path.
    let outcomes: Vec<(PathBuf, PrincipalOutcome)> = files
        .par_iter()
        .map(|path| {
            let outcome = match ext.metadata.read_all(path) {
                Ok(tags) => {
                    let readings = reconcile::readings_from(tags, config);
                    match reconcile::from_principal(path, &readings, config) {
                        Some(resolved) => PrincipalOutcome::Resolved(resolved),
                        None => PrincipalOutcome::NoPrincipal(readings),
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "metadata read failed");
                    PrincipalOutcome::ReadFailed
                }
            };
            (path.clone(), outcome)
        })
        .collect();

    let mut batch_a = Vec::new();
    let mut pending_secondary = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            PrincipalOutcome::Resolved(r) => batch_a.push(r),
            PrincipalOutcome::NoPrincipal(readings) if treat_secondary => {
                pending_secondary.push((path, readings));
            }
            PrincipalOutcome::NoPrincipal(_) => {
                info!(path = %path.display(), "no principal timestamp, file omitted");
                summary.skipped += 1;
            }
            PrincipalOutcome::ReadFailed => summary.failures += 1,
        }
    }

    // Interactive fallback is strictly one prompt at a time.
    let mut batch_b = Vec::new();
    for (path, readings) in pending_secondary {
        ext.preview.open(&path);
        match reconcile::from_secondary(&path, &readings, ext.prompt, config) {
            Ok(Some(resolved)) => batch_b.push(resolved),
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "secondary reconciliation failed");
                summary.failures += 1;
            }
        }
    }

    summary.resolved = (batch_a.len() + batch_b.len()) as u64;
    write_back(&batch_a, config, ext, rename, true, &mut summary);
    write_back(&batch_b, config, ext, false, true, &mut summary);

    let validation = run_validate(dir, config, ext)?;
    summary.quarantined = validation.quarantined;
    summary.failures += validation.failures;

    if treat_secondary {
        ext.preview.close();
    }
    Ok(summary)
}

enum FilenamePlan {
    Resolved(ReconciledTimestamp),
    Confirm {
        path: PathBuf,
        candidate: Candidate,
        interp: Interpretation,
    },
    Skipped,
}

fn run_filename_reference(
    dir: &Path,
    config: &Config,
    ext: &Collaborators,
    treat_exif: bool,
) -> Result<RunSummary> {
    let files = scan::list_media_files(dir, config, ext.mover)?;
    let mut summary = RunSummary {
        files_seen: files.len() as u64,
        ..RunSummary::default()
    };
    let now_year = chrono::Local::now().year();

    let plans: Vec<FilenamePlan> = files
        .par_iter()
        .map(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let Some(candidate) = date::filename::extract(name) else {
                info!(path = %path.display(), "no timestamp pattern in filename, file omitted");
                return FilenamePlan::Skipped;
            };
            let Some(interp) = date::validate::resolve(&candidate.digits, now_year) else {
                info!(
                    path = %path.display(),
                    digits = %candidate.digits,
                    "candidate fails calendar validation, file omitted"
                );
                return FilenamePlan::Skipped;
            };

            if interp.has_time() {
                // No metadata needed for an exact date+time.
                match reconcile::from_filename(path, &interp, &[]) {
                    FilenameOutcome::Resolved(r) => return FilenamePlan::Resolved(r),
                    _ => return FilenamePlan::Skipped,
                }
            }
            if interp.is_year_month() {
                return FilenamePlan::Confirm {
                    path: path.clone(),
                    candidate,
                    interp,
                };
            }

            // Bare date: try to complete it from metadata on the same day.
            let readings = match ext.metadata.read_all(path) {
                Ok(tags) => reconcile::readings_from(tags, config),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "metadata read failed, continuing without");
                    Vec::new()
                }
            };
            match reconcile::from_filename(path, &interp, &readings) {
                FilenameOutcome::Resolved(r) => FilenamePlan::Resolved(r),
                FilenameOutcome::NeedsConfirmation => FilenamePlan::Confirm {
                    path: path.clone(),
                    candidate,
                    interp,
                },
                FilenameOutcome::Unresolvable => FilenamePlan::Skipped,
            }
        })
        .collect();

    let mut batch = Vec::new();
    for plan in plans {
        match plan {
            FilenamePlan::Resolved(r) => batch.push(r),
            FilenamePlan::Confirm { path, candidate, interp } => {
                match reconcile::confirm_partial(&path, &candidate.source_text, &interp, ext.prompt, config) {
                    Ok(Some(r)) => batch.push(r),
                    Ok(None) => summary.skipped += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "partial date confirmation failed");
                        summary.failures += 1;
                    }
                }
            }
            FilenamePlan::Skipped => summary.skipped += 1,
        }
    }

    summary.resolved = batch.len() as u64;
    write_back(&batch, config, ext, false, treat_exif, &mut summary);

    let validation = run_validate(dir, config, ext)?;
    summary.quarantined = validation.quarantined;
    summary.failures += validation.failures;
    Ok(summary)
}

fn run_validate(dir: &Path, config: &Config, ext: &Collaborators) -> Result<RunSummary> {
    let files = scan::list_media_files(dir, config, ext.mover)?;
    let mut summary = RunSummary {
        files_seen: files.len() as u64,
        ..RunSummary::default()
    };

    let results: Vec<Result<Option<QuarantineDecision>>> = files
        .par_iter()
        .map(|path| verify::check_file(path, ext.metadata, config))
        .collect();

    let mut decisions = Vec::new();
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(Some(decision)) => decisions.push(decision),
            Ok(None) => {}
            Err(e) => {
                // Unreadable metadata is a failed check, not a quarantine.
                warn!(path = %path.display(), error = %e, "validation skipped, metadata unreadable");
                summary.failures += 1;
            }
        }
    }

    for decision in &decisions {
        info!(
            path = %decision.path.display(),
            reason = %decision.reason,
            "file failed validation"
        );
    }
    summary.quarantined = decisions.len() as u64;

    let paths: Vec<PathBuf> = decisions.iter().map(|d| d.path.clone()).collect();
    let moved = ext.mover.move_all(&paths, &dir.join(&config.quarantine_folder));
    if moved < paths.len() {
        summary.failures += (paths.len() - moved) as u64;
    }
    Ok(summary)
}

/// Apply a batch of reconciled timestamps: optional rename, metadata write,
/// filesystem attribute stamp. A failed write excludes the file from the
/// batch but never aborts the run.
fn write_back(
    batch: &[ReconciledTimestamp],
    config: &Config,
    ext: &Collaborators,
    rename: bool,
    write_metadata: bool,
    summary: &mut RunSummary,
) {
    for resolved in batch {
        let mut path = resolved.path.clone();

        if rename {
            let prefix = resolved.timestamp.format(&config.filename_format).to_string();
            match ext.renamer.rename_with_prefix(&path, &prefix, &config.partition) {
                Ok(new_path) => {
                    if new_path != path {
                        info!(from = %path.display(), to = %new_path.display(), "renamed");
                        summary.renamed += 1;
                        path = new_path;
                    }
                }
                Err(e) => {
                    // Original path is retained and write-back continues.
                    warn!(path = %path.display(), error = %e, "rename failed");
                    summary.failures += 1;
                }
            }
        }

        if write_metadata {
            let formatted = resolved.timestamp.format(&config.metadata_format).to_string();
            if let Err(e) = ext.metadata.write(&path, &formatted, &TagSelector::AllDates) {
                warn!(path = %path.display(), error = %e, "metadata write failed, file excluded from batch");
                summary.failures += 1;
                continue;
            }
        }

        if let Err(e) = ext.attrs.set_created_and_modified(&path, resolved.timestamp) {
            warn!(path = %path.display(), error = %e, "attribute stamp failed, file excluded from batch");
            summary.failures += 1;
            continue;
        }

        info!(
            path = %path.display(),
            timestamp = %resolved.timestamp.format(&config.fs_attr_format),
            origin = %resolved.origin,
            "timestamp applied"
        );
        summary.written += 1;
    }
}

#[cfg(test)]
pub(crate) mod testutil;
