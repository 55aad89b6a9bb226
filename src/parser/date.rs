//! Tolerant RFC 5322 date parsing.
//!
//! `Date:` headers in the wild deviate from the grammar constantly, so the
//! strict RFC 2822 parse is followed by a ladder of fallbacks: stripped
//! day-of-week prefixes, a list of observed formats, and named timezone
//! abbreviations replaced with numeric offsets.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Parse a date header value. Returns `None` when nothing matches.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);

    const FORMATS: [&str; 6] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %y %H:%M:%S %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    let replaced = replace_named_tz(no_dow);
    for fmt in &FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    warn!(date = trimmed, "could not parse date");
    None
}

/// Epoch seconds of a date header value; 0 when unparseable.
pub fn parse_date_epoch(date_str: &str) -> i64 {
    parse_date(date_str).map(|dt| dt.timestamp()).unwrap_or(0)
}

/// Strip a leading day-of-week ("Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 14] = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start();
        }
    }
    s
}

/// Replace a trailing named timezone with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const TZS: [(&str, &str); 11] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UT", "+0000"),
        ("CET", "+0100"),
    ];
    for (name, offset) in &TZS {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}
