use chrono::{DateTime, Datelike, NaiveDateTime};

/// Parse a raw metadata tag value into a naive timestamp.
///
/// Formats are tried in order; each one is also retried with a trailing zone
/// offset, which is discarded after conversion. A value parsing to the epoch
/// sentinel (1970-01-01, any time of day) means "field not set" in the
/// metadata tool and yields `None`.
pub fn parse_metadata_value(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut parsed = None;
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            parsed = Some(dt);
            break;
        }
        // Zoned variant, e.g. "2023:06:15 14:30:00+02:00"
        let zoned = format!("{format}%z");
        if let Ok(dt) = DateTime::parse_from_str(raw, &zoned) {
            parsed = Some(dt.naive_local());
            break;
        }
    }

    parsed.filter(|dt| !is_epoch_sentinel(dt))
}

/// The metadata tool writes 1970-01-01 when a field has no data.
pub fn is_epoch_sentinel(ts: &NaiveDateTime) -> bool {
    ts.year() == 1970 && ts.month() == 1 && ts.day() == 1
}
