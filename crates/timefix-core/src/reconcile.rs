use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::date::parse::parse_metadata_value;
use crate::date::validate::Interpretation;
use crate::error::Result;
use crate::gateway::InteractivePrompt;
use crate::Config;

/// One metadata tag as read from a file. `parsed` is `None` for values that
/// fail every format or carry the epoch sentinel.
#[derive(Debug, Clone)]
pub struct MetadataReading {
    pub tag: String,
    pub raw: String,
    pub parsed: Option<NaiveDateTime>,
}

/// Convert a raw tag map from the metadata gateway into readings.
pub fn readings_from(tags: BTreeMap<String, String>, config: &Config) -> Vec<MetadataReading> {
    tags.into_iter()
        .map(|(tag, raw)| {
            let parsed = parse_metadata_value(&raw, &config.metadata_parse_formats);
            MetadataReading { tag, raw, parsed }
        })
        .collect()
}

/// Where a reconciled timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    PrincipalMetadata,
    SecondaryMetadataInteractive,
    FilenameExact,
    FilenamePartialMetadataMatch,
    FilenamePartialDefaultFill,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Origin::PrincipalMetadata => "principal-metadata",
            Origin::SecondaryMetadataInteractive => "secondary-metadata-interactive",
            Origin::FilenameExact => "filename-exact",
            Origin::FilenamePartialMetadataMatch => "filename-partial-metadata-match",
            Origin::FilenamePartialDefaultFill => "filename-partial-default-fill",
        };
        f.write_str(s)
    }
}

/// The single timestamp chosen for a file in this run; the sole truth used
/// for write-back.
#[derive(Debug, Clone)]
pub struct ReconciledTimestamp {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub origin: Origin,
}

/// Principal context: earliest parsed value among the authoritative tags.
pub fn from_principal(
    path: &Path,
    readings: &[MetadataReading],
    config: &Config,
) -> Option<ReconciledTimestamp> {
    let earliest = readings
        .iter()
        .filter(|r| config.is_principal(&r.tag))
        .filter_map(|r| r.parsed)
        .min()?;
    debug!(path = %path.display(), timestamp = %earliest, "principal metadata resolved");
    Some(ReconciledTimestamp {
        path: path.to_path_buf(),
        timestamp: earliest,
        origin: Origin::PrincipalMetadata,
    })
}

/// Secondary context: offer every non-principal timestamp to the operator.
///
/// Candidates are deduplicated and sorted ascending; option "0" is the
/// "none of these apply" sentinel and yields no resolution.
pub fn from_secondary(
    path: &Path,
    readings: &[MetadataReading],
    prompt: &dyn InteractivePrompt,
    config: &Config,
) -> Result<Option<ReconciledTimestamp>> {
    let mut candidates: Vec<NaiveDateTime> = readings
        .iter()
        .filter(|r| !config.is_principal(&r.tag))
        .filter_map(|r| r.parsed)
        .collect();
    candidates.sort();
    candidates.dedup();

    if candidates.is_empty() {
        info!(path = %path.display(), "no secondary timestamps, file omitted");
        return Ok(None);
    }

    let mut text = format!("Select a timestamp for {}:\n  0: none apply\n", path.display());
    let mut valid = vec!["0".to_string()];
    for (i, ts) in candidates.iter().enumerate() {
        text.push_str(&format!("  {}: {}\n", i + 1, ts.format(&config.metadata_format)));
        valid.push((i + 1).to_string());
    }

    let answer = prompt.choose(&text, &valid)?;
    if answer == "0" {
        info!(path = %path.display(), "operator declined all secondary timestamps, file omitted");
        return Ok(None);
    }
    let idx: usize = answer
        .parse()
        .map_err(|_| crate::Error::Prompt(format!("not an index: {answer}")))?;
    let timestamp = candidates[idx - 1];
    info!(path = %path.display(), %timestamp, "secondary timestamp selected");
    Ok(Some(ReconciledTimestamp {
        path: path.to_path_buf(),
        timestamp,
        origin: Origin::SecondaryMetadataInteractive,
    }))
}

/// Result of the non-interactive part of the filename context. Partial dates
/// that found no metadata match still need operator confirmation, which the
/// orchestrator serializes.
#[derive(Debug, Clone)]
pub enum FilenameOutcome {
    Resolved(ReconciledTimestamp),
    NeedsConfirmation,
    Unresolvable,
}

/// Filename context, non-interactive tiers: a full date+time converts
/// directly; a bare date is completed from the earliest metadata value on the
/// same calendar day.
pub fn from_filename(
    path: &Path,
    interp: &Interpretation,
    readings: &[MetadataReading],
) -> FilenameOutcome {
    if let Some(ts) = interp.to_datetime() {
        return FilenameOutcome::Resolved(ReconciledTimestamp {
            path: path.to_path_buf(),
            timestamp: ts,
            origin: Origin::FilenameExact,
        });
    }

    if let Some(date) = interp.to_date() {
        let earliest_same_day = readings
            .iter()
            .filter_map(|r| r.parsed)
            .filter(|ts| ts.date() == date)
            .min();
        if let Some(ts) = earliest_same_day {
            debug!(path = %path.display(), timestamp = %ts, "date completed from metadata");
            return FilenameOutcome::Resolved(ReconciledTimestamp {
                path: path.to_path_buf(),
                timestamp: ts,
                origin: Origin::FilenamePartialMetadataMatch,
            });
        }
        return FilenameOutcome::NeedsConfirmation;
    }

    if interp.is_year_month() {
        return FilenameOutcome::NeedsConfirmation;
    }
    FilenameOutcome::Unresolvable
}

/// Interactive completion of a partial date: on affirmation a bare date gets
/// the default time of day, a year-month additionally gets the default day.
pub fn confirm_partial(
    path: &Path,
    source_text: &str,
    interp: &Interpretation,
    prompt: &dyn InteractivePrompt,
    config: &Config,
) -> Result<Option<ReconciledTimestamp>> {
    let completed = if let Some(date) = interp.to_date() {
        date.and_time(config.default_time)
    } else if let Some((year, month)) = interp.year_month() {
        match chrono::NaiveDate::from_ymd_opt(year, month, config.default_day) {
            Some(date) => date.and_time(config.default_time),
            None => return Ok(None),
        }
    } else {
        return Ok(None);
    };

    let question = format!(
        "Is \"{}\" in {} a valid partial date ({})? [y/n]",
        source_text,
        path.display(),
        completed.format(&config.metadata_format),
    );
    if !prompt.confirm(&question)? {
        info!(path = %path.display(), source_text, "partial date rejected, file omitted");
        return Ok(None);
    }

    info!(path = %path.display(), timestamp = %completed, "partial date completed with defaults");
    Ok(Some(ReconciledTimestamp {
        path: path.to_path_buf(),
        timestamp: completed,
        origin: Origin::FilenamePartialDefaultFill,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::validate::resolve;
    use crate::testutil::ScriptedPrompt;
    use chrono::NaiveDate;

    fn reading(tag: &str, raw: &str, config: &Config) -> MetadataReading {
        MetadataReading {
            tag: tag.to_string(),
            raw: raw.to_string(),
            parsed: parse_metadata_value(raw, &config.metadata_parse_formats),
        }
    }

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn principal_picks_earliest_parsed_value() {
        let config = Config::default();
        let readings = vec![
            reading("CreateDate", "2023:06:15 14:30:00", &config),
            reading("DateTimeOriginal", "2023:06:15 10:00:00", &config),
            reading("FileModifyDate", "2020:01:01 00:00:00", &config),
        ];
        let r = from_principal(Path::new("a.jpg"), &readings, &config).unwrap();
        assert_eq!(r.timestamp, dt(2023, 6, 15, 10, 0, 0));
        assert_eq!(r.origin, Origin::PrincipalMetadata);
    }

    #[test]
    fn principal_ignores_sentinel_and_secondary_tags() {
        let config = Config::default();
        let readings = vec![
            reading("DateTimeOriginal", "1970:01:01 00:00:00", &config),
            reading("FileModifyDate", "2020:01:01 00:00:00", &config),
        ];
        assert!(from_principal(Path::new("a.jpg"), &readings, &config).is_none());
    }

    #[test]
    fn secondary_selection_by_index() {
        let config = Config::default();
        let readings = vec![
            reading("FileModifyDate", "2023:06:15 14:30:00", &config),
            reading("ProfileDateTime", "2021:01:02 03:04:05", &config),
            reading("Duplicate", "2021:01:02 03:04:05", &config),
        ];
        let prompt = ScriptedPrompt::new(&["2"]);
        let r = from_secondary(Path::new("a.jpg"), &readings, &prompt, &config)
            .unwrap()
            .unwrap();
        // Sorted ascending and deduplicated: index 2 is the later value.
        assert_eq!(r.timestamp, dt(2023, 6, 15, 14, 30, 0));
        assert_eq!(r.origin, Origin::SecondaryMetadataInteractive);
    }

    #[test]
    fn secondary_none_sentinel_omits_file() {
        let config = Config::default();
        let readings = vec![reading("FileModifyDate", "2023:06:15 14:30:00", &config)];
        let prompt = ScriptedPrompt::new(&["0"]);
        assert!(from_secondary(Path::new("a.jpg"), &readings, &prompt, &config)
            .unwrap()
            .is_none());
    }

    #[test]
    fn filename_full_datetime_is_exact() {
        let config = Config::default();
        let interp = resolve("20230615143000", 2026).unwrap();
        match from_filename(Path::new("a.jpg"), &interp, &[]) {
            FilenameOutcome::Resolved(r) => {
                assert_eq!(r.timestamp, dt(2023, 6, 15, 14, 30, 0));
                assert_eq!(r.origin, Origin::FilenameExact);
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn bare_date_takes_earliest_matching_metadata() {
        let config = Config::default();
        let readings = vec![
            reading("FileModifyDate", "2023:06:15 14:00:00", &config),
            reading("ProfileDateTime", "2023:06:15 10:00:00", &config),
            reading("Other", "2023:06:16 08:00:00", &config),
        ];
        let interp = resolve("20230615", 2026).unwrap();
        match from_filename(Path::new("a.jpg"), &interp, &readings) {
            FilenameOutcome::Resolved(r) => {
                assert_eq!(r.timestamp, dt(2023, 6, 15, 10, 0, 0));
                assert_eq!(r.origin, Origin::FilenamePartialMetadataMatch);
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn bare_date_without_metadata_needs_confirmation() {
        let config = Config::default();
        let interp = resolve("20230615", 2026).unwrap();
        assert!(matches!(
            from_filename(Path::new("a.jpg"), &interp, &[]),
            FilenameOutcome::NeedsConfirmation
        ));
    }

    #[test]
    fn confirmed_bare_date_gets_default_time() {
        let config = Config::default();
        let interp = resolve("20230615", 2026).unwrap();
        let prompt = ScriptedPrompt::new(&["y"]);
        let r = confirm_partial(Path::new("a.jpg"), "20230615", &interp, &prompt, &config)
            .unwrap()
            .unwrap();
        assert_eq!(r.timestamp, dt(2023, 6, 15, 0, 1, 0));
        assert_eq!(r.origin, Origin::FilenamePartialDefaultFill);
    }

    #[test]
    fn confirmed_year_month_gets_default_day_and_time() {
        let config = Config::default();
        let interp = resolve("202304", 2026).unwrap();
        let prompt = ScriptedPrompt::new(&["y"]);
        let r = confirm_partial(Path::new("a.jpg"), "202304", &interp, &prompt, &config)
            .unwrap()
            .unwrap();
        assert_eq!(r.timestamp, dt(2023, 4, 1, 0, 1, 0));
    }

    #[test]
    fn denied_partial_date_resolves_to_nothing() {
        let config = Config::default();
        let interp = resolve("20230615", 2026).unwrap();
        let prompt = ScriptedPrompt::new(&["n"]);
        assert!(
            confirm_partial(Path::new("a.jpg"), "20230615", &interp, &prompt, &config)
                .unwrap()
                .is_none()
        );
    }
}
