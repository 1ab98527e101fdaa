use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static DAY_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[-–]\s*\d{1,2}\s+(.+)$").expect("valid regex"));
static MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)\s+(\d{4})$").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

/// Formats tried after punctuation is removed, in order
const DAY_FORMATS: &[&str] = &["%d %B %Y", "%B %d %Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Parses a publication date printed in any of the formats the sources use
///
/// Handles ISO dates, RFC 3339 timestamps, "30 August 2019", "Aug 30, 2019",
/// day ranges such as "3-5 Dec. 2020" (first day wins), "10/01/2001"
/// (month first), "19-10-2002" (day first), "August 2019" (first of the
/// month) and a bare year (1 January).
///
/// Returns `None` for anything else; an unknown date is never an error.
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Some(ts.date_naive());
    }

    // "Dec. 2020" and "August 30, 2019"
    let text = text.replace(['.', ','], "");
    let text = match DAY_RANGE_RE.captures(&text) {
        Some(caps) => format!("{} {}", &caps[1], &caps[2]),
        None => text,
    };

    for format in DAY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Some(date);
        }
    }

    if let Some(caps) = MONTH_YEAR_RE.captures(&text) {
        let first = format!("1 {} {}", &caps[1], &caps[2]);
        return NaiveDate::parse_from_str(&first, "%d %B %Y").ok();
    }

    if YEAR_RE.is_match(&text) {
        return text
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }

    None
}
