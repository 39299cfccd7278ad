use crate::ArcStr;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use std::{fs, io, path::Path};

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers to parse cells with quirks.

/// Spellings of a missing value seen in the source extracts.
const NULL_TOKENS: &[&str] = &["null", "nan", "na", "n/a", "#n/a", "none", "<na>"];

/// Date-times, tried in order. Timezone offsets are handled separately.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Dates without a time part, tried in order. Day comes before month, as in the source data.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d", "%Y%m%d"];

/// Whether a raw cell means "no value" (in addition to the empty string).
pub fn is_null(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || NULL_TOKENS.iter().any(|tok| s.eq_ignore_ascii_case(tok))
}

/// Parse a date or date-time cell. Anything unrecognised is `None`.
///
/// Dates without a time part are at midnight. Offsets are dropped, keeping the wall-clock time.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a decimal number, accepting a single `,` as the decimal separator.
///
/// A comma followed by exactly three digits (`1,000`) could be a thousands separator, so it is
/// rejected rather than guessed. Non-finite values are rejected too, so every parsed number can
/// be ordered.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let v = match s.split_once(',') {
        Some((int, frac)) if !s.contains('.') && !frac.contains(',') => {
            let int_digits = int.trim_start_matches(['-', '+']);
            let grouped = frac.len() == 3
                && frac.bytes().all(|b| b.is_ascii_digit())
                && !int_digits.trim_start_matches('0').is_empty();
            if grouped {
                return None;
            }
            format!("{}.{}", int, frac).parse::<f64>().ok()?
        }
        Some(_) => return None,
        None => s.parse::<f64>().ok()?,
    };
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

/// The canonical text form of a patient identifier.
///
/// Ids are exported as numbers by some systems and as text by others, so integral numbers are
/// normalized (`"42.0"`, `"0042"` and `"42"` are the same patient). Only plain digits with an
/// optional all-zero fraction count as numbers. Anything else is compared as trimmed text.
pub fn canonical_id(s: &str) -> Option<ArcStr> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    let integral = !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b == b'0');
    if !integral {
        return Some(s.into());
    }
    match int.trim_start_matches('0') {
        "" => Some("0".into()),
        digits => Some(digits.into()),
    }
}

/// Render a date-time the way it is exported: the date alone when the time is midnight.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 && dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Print a title underlined with `=`.
pub fn header(header: &str) {
    let len = header.chars().count();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}
