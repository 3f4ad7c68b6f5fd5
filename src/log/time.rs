use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Timestamp layout written by the counter collector, e.g. `01/05/2026 14:30:01.123`.
const HIGH_FREQUENCY_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.f";

/// Layouts tried, in order, when the fixed format does not apply.
const LENIENT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%Y%m%d_%H%M%S",
];

/// Fixed collector format first, then the lenient parser.
pub fn parse_high_frequency(raw: &str) -> Option<NaiveDateTime> {
    let s = clean(raw)?;
    NaiveDateTime::parse_from_str(s, HIGH_FREQUENCY_FORMAT)
        .ok()
        .or_else(|| parse_lenient(s))
}

/// Best-effort parsing. Unparseable input yields `None`.
pub fn parse_lenient(raw: &str) -> Option<NaiveDateTime> {
    let s = clean(raw)?;
    for fmt in LENIENT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn clean(raw: &str) -> Option<&str> {
    let s = raw.trim().trim_matches('"').trim();
    (!s.is_empty()).then_some(s)
}
