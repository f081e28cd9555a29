use super::record::{fields, Record};
use chrono::{DateTime, Month, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const HOURS_UNDER_30: &str = "Less than 30 Hours";
pub const HOURS_30_PLUS: &str = "30+ Hours";
pub const UNKNOWN_VALUE: &str = "Unknown";

const UNDER_30_PHRASES: &[&str] = &["less than 30", "under 30", "< 30", "0-29"];
const OVER_30_PHRASES: &[&str] = &[
    "30+",
    "30 or more",
    "30 and above",
    "30+ hours",
    "30 hours",
    "30 hrs",
    "30",
];
const RANGE_UNDER_30_PHRASES: &[&str] = &["20-29", "20 to 29", "20-30"];
const FULL_TIME_PHRASES: &[&str] = &["40+", "40 hours", "40 hrs", "full time"];
const PART_TIME_PHRASES: &[&str] = &["part time", "part-time", "10-20", "15-25"];

/// Rewrites the free-form `hours` and `month` columns into their fixed
/// vocabularies. Fields the schema does not declare are left alone.
pub fn standardize_values(records: &mut [Record]) {
    for record in records.iter_mut() {
        if record.contains(fields::HOURS) {
            let hours = standardize_hours(record.text(fields::HOURS).as_deref());
            record.set(fields::HOURS, Value::String(hours.to_string()));
        }
        if record.contains(fields::MONTH) {
            let month = month_name(record.text(fields::MONTH).as_deref());
            record.set(fields::MONTH, Value::String(month));
        }
    }
}

pub fn standardize_hours(raw: Option<&str>) -> &'static str {
    let Some(raw) = raw else {
        return UNKNOWN_VALUE;
    };
    let value = raw.trim().to_lowercase();
    if value.is_empty() || value == "null" || value == "undefined" {
        return UNKNOWN_VALUE;
    }

    let matches = |phrases: &[&str]| phrases.iter().any(|phrase| value.contains(phrase));

    // Phrase groups are checked in order; the bare "30" entry shadows "20-30".
    if matches(UNDER_30_PHRASES) {
        HOURS_UNDER_30
    } else if matches(OVER_30_PHRASES) {
        HOURS_30_PLUS
    } else if matches(RANGE_UNDER_30_PHRASES) {
        HOURS_UNDER_30
    } else if matches(FULL_TIME_PHRASES) {
        HOURS_30_PLUS
    } else if matches(PART_TIME_PHRASES) {
        HOURS_UNDER_30
    } else {
        match first_integer(&value) {
            Some(hours) if hours >= 30 => HOURS_30_PLUS,
            Some(_) => HOURS_UNDER_30,
            None => UNKNOWN_VALUE,
        }
    }
}

fn first_integer(value: &str) -> Option<u64> {
    let digits: String = value
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// English month name for a date-like value; month names pass through.
pub fn month_name(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(parse_month)
        .unwrap_or_else(|| UNKNOWN_VALUE.to_string())
}

fn parse_month(value: &str) -> Option<String> {
    if let Ok(month) = value.parse::<Month>() {
        return Some(month.name().to_string());
    }

    let date = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.date_naive()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        dt.date()
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        date
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%m/%d/%Y") {
        date
    } else {
        return None;
    };

    Some(date.format("%B").to_string())
}
