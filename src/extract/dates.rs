// src/extract/dates.rs
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;
use tracing::trace;

static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}\b").expect("valid regex"));

/// Date layouts accepted by [`parse_year_lenient`], tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%d/%m/%Y", "%B %d, %Y", "%Y/%m/%d"];

/// Year of the `"%d %B %Y"` date that follows `prefix` in `text`.
///
/// `"ratified on 05 December 1997"` with prefix `"ratified on"` → `Some(1997)`.
/// Missing prefix or an unparsable date gives `None`.
pub fn extract_year_after_prefix(text: &str, prefix: &str) -> Option<i32> {
    let rest = text.split(prefix).nth(1)?;
    let date: Vec<&str> = rest.split_whitespace().take(3).collect();
    let date = date.join(" ");
    let date = date.trim_end_matches(['.', ',', ';', ')']);
    match NaiveDate::parse_from_str(date, "%d %B %Y") {
        Ok(d) => Some(d.year()),
        Err(e) => {
            trace!(text, prefix, error = %e, "no date after prefix");
            None
        }
    }
}

/// Year from a loosely formatted date string, or a bare four-digit year.
pub fn parse_year_lenient(text: &str) -> Option<i32> {
    let s = text
        .trim()
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.year());
        }
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }
    None
}

/// Every standalone four-digit number in `text` that falls inside `range`.
pub fn valid_years(text: &str, range: &RangeInclusive<i32>) -> Vec<i32> {
    FOUR_DIGITS
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| range.contains(y))
        .collect()
}
