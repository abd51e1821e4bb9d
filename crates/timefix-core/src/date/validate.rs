use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Which ordering of the two middle digit groups an interpretation assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Direct,
    SwappedMonthDay,
}

/// One calendar reading of a digit blob: year, month, day, hour, minute,
/// second. Trailing groups are absent for partial dates; a group that failed
/// integer conversion is `None` and poisons only this interpretation.
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub variant: Variant,
    groups: Vec<Option<u32>>,
}

impl Interpretation {
    fn group(&self, idx: usize) -> Option<u32> {
        self.groups.get(idx).copied().flatten()
    }

    pub fn year(&self) -> Option<i32> {
        self.group(0).map(|y| y as i32)
    }

    /// True when all six groups are present (a full date + time).
    pub fn has_time(&self) -> bool {
        self.groups.len() == 6
    }

    /// True when only year and month are present.
    pub fn is_year_month(&self) -> bool {
        self.groups.len() == 2
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year()?, self.group(1)?, self.group(2)?)
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if !self.has_time() {
            return None;
        }
        self.to_date()?
            .and_hms_opt(self.group(3)?, self.group(4)?, self.group(5)?)
    }

    pub fn year_month(&self) -> Option<(i32, u32)> {
        Some((self.year()?, self.group(1)?))
    }
}

/// Iterative fixed-width chunking into [4,2,2,2,2,2]; a short final group is
/// kept as-is and dropped later by validity checking.
fn chunk(digits: &str) -> Vec<String> {
    const WIDTHS: [usize; 6] = [4, 2, 2, 2, 2, 2];
    let mut out = Vec::new();
    let mut rest = digits;
    for width in WIDTHS {
        if rest.is_empty() {
            break;
        }
        let take = width.min(rest.len());
        let (head, tail) = rest.split_at(take);
        out.push(head.to_string());
        rest = tail;
    }
    out
}

/// Derive the candidate readings of a digit blob.
///
/// When both a year and a month/day pair are present this yields exactly two
/// interpretations, direct and swapped-month-day, which resolves the
/// day-first vs month-first filename ambiguity without guessing a locale.
pub fn interpretations(digits: &str) -> Vec<Interpretation> {
    let groups: Vec<Option<u32>> = chunk(digits).iter().map(|g| g.parse().ok()).collect();
    if groups.len() < 2 {
        return Vec::new();
    }

    let direct = Interpretation {
        variant: Variant::Direct,
        groups: groups.clone(),
    };
    if groups.len() < 3 {
        return vec![direct];
    }

    let mut swapped_groups = groups;
    swapped_groups.swap(1, 2);
    vec![
        direct,
        Interpretation {
            variant: Variant::SwappedMonthDay,
            groups: swapped_groups,
        },
    ]
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(0)
}

fn interpretation_is_valid(interp: &Interpretation, now_year: i32) -> bool {
    let Some(year) = interp.year() else {
        return false;
    };
    if year < now_year - 100 || year > now_year {
        return false;
    }

    let Some(month) = interp.group(1) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }

    // Bounds per position: day, hour, minute, second. Day depends on the
    // month just checked; an invalid month never reaches this point.
    let limits = [days_in_month(year, month), 23, 59, 59];
    let mins = [1, 0, 0, 0];
    for (idx, (max, min)) in limits.iter().zip(mins.iter()).enumerate() {
        if idx + 2 >= interp.groups.len() {
            break;
        }
        match interp.group(idx + 2) {
            Some(v) if (*min..=*max).contains(&v) => {}
            _ => return false,
        }
    }
    true
}

/// A digit blob is valid when at least one of its interpretations is.
pub fn is_valid(digits: &str, now_year: i32) -> bool {
    resolve(digits, now_year).is_some()
}

/// Pick the interpretation to act on. When both readings are calendar-valid
/// the direct one wins; that tie-break is logged as a decision.
pub fn resolve(digits: &str, now_year: i32) -> Option<Interpretation> {
    let valid: Vec<Interpretation> = interpretations(digits)
        .into_iter()
        .filter(|i| interpretation_is_valid(i, now_year))
        .collect();

    if valid.len() > 1 {
        debug!(digits, "both day/month readings are valid, keeping the direct one");
    }
    let direct = valid.iter().position(|i| i.variant == Variant::Direct);
    match direct {
        Some(pos) => valid.into_iter().nth(pos),
        None => valid.into_iter().next(),
    }
}
