use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// A digit string pulled out of a filename that might encode a date and/or
/// time. `digits` is 6, 8, or 14 characters after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The matched substring as it appeared in the filename.
    pub source_text: String,
    /// The match with all non-digit characters stripped.
    pub digits: String,
}

// Ordered longest/most-specific first. The month/day slots are deliberately
// loose ([0-3]\d for both) so that day-first filenames survive extraction;
// the validator decides which reading is calendar-valid.
static RE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}[-._][0-3]\d[-._][0-3]\d[ _-][0-2]\d[-.:_][0-5]\d[-.:_][0-5]\d)").unwrap()
});
static RE_LOCALE_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}-[0-3]\d-[0-3]\d (?:at|um) [0-2]\d\.[0-5]\d\.[0-5]\d)").unwrap()
});
static RE_ISO_T: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}-?[0-3]\d-?[0-3]\dT[0-2]\d:?[0-5]\d:?[0-5]\d)").unwrap()
});
static RE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}[0-3]\d[0-3]\d[-_][0-2]\d[0-5]\d[0-5]\d)").unwrap()
});
static RE_BARE_14: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}[0-3]\d[0-3]\d[0-2]\d[0-5]\d[0-5]\d)").unwrap()
});
static RE_DATE_8: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>(20|19)\d{2}[0-3]\d[0-3]\d)").unwrap()
});
static RE_YEAR_MONTH_6: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<date>(20|19)\d{2}[0-1]\d)").unwrap());

static PATTERNS: &[&LazyLock<Regex>] = &[
    &RE_SEPARATED,
    &RE_LOCALE_AT,
    &RE_ISO_T,
    &RE_PAIR,
    &RE_BARE_14,
    &RE_DATE_8,
    &RE_YEAR_MONTH_6,
];

/// Scan a filename for a date-bearing digit run.
///
/// Every pattern is tried and the longest match wins (earlier patterns win
/// ties), so an embedded full datetime always beats the bare-date prefix it
/// contains.
pub fn extract(filename: &str) -> Option<Candidate> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let mut best: Option<&str> = None;
    for pat in PATTERNS {
        if let Some(caps) = pat.captures(basename) {
            if let Some(m) = caps.name("date") {
                if best.map_or(true, |b| m.as_str().len() > b.len()) {
                    best = Some(m.as_str());
                }
            }
        }
    }

    let source_text = best?;
    let digits: String = source_text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(Candidate {
        source_text: source_text.to_string(),
        digits,
    })
}
