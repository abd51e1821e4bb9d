use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::date::parse::parse_metadata_value;
use crate::error::Result;
use crate::gateway::MetadataGateway;
use crate::Config;

/// Why a file failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    /// The filename carries no parseable timestamp prefix.
    NoFilenameTimestamp,
    /// A principal tag disagrees with the filename timestamp.
    Mismatch { tag: String },
    /// No principal tag yielded a parseable value to compare against.
    NoComparableMetadata,
}

impl std::fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarantineReason::NoFilenameTimestamp => f.write_str("no valid timestamp in filename"),
            QuarantineReason::Mismatch { tag } => write!(f, "mismatch against {tag}"),
            QuarantineReason::NoComparableMetadata => f.write_str("no comparable metadata"),
        }
    }
}

/// Decision to relocate a file for manual review. The mover stamps the file
/// with the current time on relocation.
#[derive(Debug, Clone)]
pub struct QuarantineDecision {
    pub path: PathBuf,
    pub reason: QuarantineReason,
}

/// Backup files the metadata tool leaves behind during in-place writes.
pub fn is_tool_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with("_original"))
}

/// Re-derive the timestamp the filename claims: the portion before the
/// partition string, or the whole stem when no partition is present.
pub fn filename_timestamp(path: &Path, config: &Config) -> Option<NaiveDateTime> {
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    let head = stem
        .split_once(config.partition.as_str())
        .map(|(head, _)| head)
        .unwrap_or(stem);
    NaiveDateTime::parse_from_str(head, &config.filename_format).ok()
}

/// Cross-check one file's filename timestamp against its principal metadata
/// tags. Returns at most one decision per file, even when several tags
/// disagree.
pub fn check_file(
    path: &Path,
    gateway: &dyn MetadataGateway,
    config: &Config,
) -> Result<Option<QuarantineDecision>> {
    if is_tool_artifact(path) {
        return Ok(None);
    }

    let Some(expected) = filename_timestamp(path, config) else {
        info!(path = %path.display(), "no valid filename timestamp");
        return Ok(Some(QuarantineDecision {
            path: path.to_path_buf(),
            reason: QuarantineReason::NoFilenameTimestamp,
        }));
    };

    let mut comparable = false;
    let mut first_read_error = None;
    for tag in &config.principal_tags {
        let raw = match gateway.read_one(path, tag) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), tag, error = %e, "metadata read failed during validation");
                if first_read_error.is_none() {
                    first_read_error = Some(e);
                }
                continue;
            }
        };
        let Some(parsed) = raw.as_deref().and_then(|r| parse_metadata_value(r, &config.metadata_parse_formats)) else {
            continue;
        };
        comparable = true;
        if parsed != expected {
            info!(
                path = %path.display(),
                tag,
                filename = %expected,
                metadata = %parsed,
                "filename and metadata disagree"
            );
            return Ok(Some(QuarantineDecision {
                path: path.to_path_buf(),
                reason: QuarantineReason::Mismatch { tag: tag.clone() },
            }));
        }
    }

    if !comparable {
        // A file is only quarantined over metadata that was actually read.
        // When every tag failed to read the file is left in place and the
        // failure is reported to the caller.
        if let Some(e) = first_read_error {
            return Err(e);
        }
        info!(path = %path.display(), "no principal tag with a comparable value");
        return Ok(Some(QuarantineDecision {
            path: path.to_path_buf(),
            reason: QuarantineReason::NoComparableMetadata,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::gateway::TagSelector;
    use crate::testutil::{FailingGateway, MemoryGateway};
    use std::collections::BTreeMap;

    #[test]
    fn matching_file_is_not_quarantined() {
        let config = Config::default();
        let gateway = MemoryGateway::default().with_tags(
            "20230615_143000__photo.jpg",
            &[("DateTimeOriginal", "2023:06:15 14:30:00")],
        );
        let decision = check_file(Path::new("20230615_143000__photo.jpg"), &gateway, &config).unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn mismatch_is_quarantined() {
        let config = Config::default();
        let gateway = MemoryGateway::default().with_tags(
            "20230615_143000__photo.jpg",
            &[("DateTimeOriginal", "2023:06:16 14:30:00")],
        );
        let decision = check_file(Path::new("20230615_143000__photo.jpg"), &gateway, &config)
            .unwrap()
            .unwrap();
        assert!(matches!(decision.reason, QuarantineReason::Mismatch { .. }));
    }

    #[test]
    fn off_by_one_second_is_a_mismatch() {
        let config = Config::default();
        let gateway = MemoryGateway::default().with_tags(
            "20230615_143000__photo.jpg",
            &[("DateTimeOriginal", "2023:06:15 14:30:01")],
        );
        assert!(check_file(Path::new("20230615_143000__photo.jpg"), &gateway, &config)
            .unwrap()
            .is_some());
    }

    #[test]
    fn missing_filename_timestamp_is_quarantined() {
        let config = Config::default();
        let gateway = MemoryGateway::default();
        let decision = check_file(Path::new("holiday_photo.jpg"), &gateway, &config)
            .unwrap()
            .unwrap();
        assert_eq!(decision.reason, QuarantineReason::NoFilenameTimestamp);
    }

    #[test]
    fn file_without_comparable_metadata_is_quarantined() {
        let config = Config::default();
        // Sentinel values never count as comparable.
        let gateway = MemoryGateway::default().with_tags(
            "20230615_143000__photo.jpg",
            &[("DateTimeOriginal", "1970:01:01 00:00:00")],
        );
        let decision = check_file(Path::new("20230615_143000__photo.jpg"), &gateway, &config)
            .unwrap()
            .unwrap();
        assert_eq!(decision.reason, QuarantineReason::NoComparableMetadata);
    }

    #[test]
    fn unreadable_metadata_is_an_error_not_a_quarantine() {
        // Every tag read fails; the file must stay in place and the failure
        // surface to the caller instead of a no-comparable-metadata decision.
        let config = Config::default();
        let err = check_file(Path::new("20230615_143000__photo.jpg"), &FailingGateway, &config)
            .unwrap_err();
        assert!(matches!(err, Error::MetadataRead { .. }));
    }

    #[test]
    fn read_failure_on_one_tag_does_not_block_comparison() {
        struct Flaky(MemoryGateway);
        impl MetadataGateway for Flaky {
            fn read_all(&self, path: &Path) -> crate::error::Result<BTreeMap<String, String>> {
                self.0.read_all(path)
            }
            fn read_one(&self, path: &Path, tag: &str) -> crate::error::Result<Option<String>> {
                if tag == "DateTimeOriginal" {
                    return Err(Error::MetadataRead {
                        path: path.to_path_buf(),
                        message: "simulated read failure".to_string(),
                    });
                }
                self.0.read_one(path, tag)
            }
            fn write(&self, path: &Path, formatted: &str, tags: &TagSelector) -> crate::error::Result<()> {
                self.0.write(path, formatted, tags)
            }
        }

        let config = Config::default();
        let gateway = Flaky(MemoryGateway::default().with_tags(
            "20230615_143000__photo.jpg",
            &[("CreateDate", "2023:06:15 14:30:00")],
        ));
        // CreateDate still reads and matches, so the file passes.
        assert!(check_file(Path::new("20230615_143000__photo.jpg"), &gateway, &config)
            .unwrap()
            .is_none());
    }

    #[test]
    fn whole_stem_is_used_when_no_partition_exists() {
        let config = Config::default();
        let gateway = MemoryGateway::default().with_tags(
            "20230615_143000.jpg",
            &[("DateTimeOriginal", "2023:06:15 14:30:00")],
        );
        assert!(check_file(Path::new("20230615_143000.jpg"), &gateway, &config)
            .unwrap()
            .is_none());
    }

    #[test]
    fn tool_artifacts_are_skipped() {
        let config = Config::default();
        let gateway = MemoryGateway::default();
        assert!(check_file(Path::new("photo.jpg_original"), &gateway, &config)
            .unwrap()
            .is_none());
    }
}
