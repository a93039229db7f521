//! Maps loosely named table columns onto the six report fields.
//!
//! Matching is a best-effort heuristic: a header matches a field when its
//! lowercase form contains any of the field's candidate names, and the first
//! matching header in header order wins. Missing or unparsable values fall
//! back to defaults instead of failing.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SAMPLE: &str = "Unbekannt";

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "date", "time", "datetime", "created_at"];
const THC_COLUMNS: &[&str] = &["thc", "thc_content", "thc%", "thc_percent"];
const CBD_COLUMNS: &[&str] = &["cbd", "cbd_content", "cbd%", "cbd_percent"];
const MOISTURE_COLUMNS: &[&str] = &["moisture", "humidity", "water", "feuchtigkeit"];
const WATER_ACTIVITY_COLUMNS: &[&str] = &["water_activity", "aw", "water_ac", "wasseraktivitaet"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// One analysis result, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub sample_name: String,
    pub timestamp: DateTime<FixedOffset>,
    pub thc: f64,
    pub cbd: f64,
    pub moisture: f64,
    pub water_activity: f64,
}

/// Which header (if any) feeds each report field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub name: Option<String>,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub thc: Option<String>,
    pub cbd: Option<String>,
    pub moisture: Option<String>,
    pub water_activity: Option<String>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        ColumnMap {
            name: exact_or_containing(headers, "name"),
            id: exact_or_containing(headers, "id"),
            timestamp: first_matching(headers, TIMESTAMP_COLUMNS),
            thc: first_matching(headers, THC_COLUMNS),
            cbd: first_matching(headers, CBD_COLUMNS),
            moisture: first_matching(headers, MOISTURE_COLUMNS),
            water_activity: first_matching(headers, WATER_ACTIVITY_COLUMNS),
        }
    }

    /// The column identifying a sample. A name column beats an id column.
    pub fn identity(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }

    /// Builds a record from one row, using `now` when no timestamp resolves.
    pub fn record(&self, row: &HashMap<String, String>, now: DateTime<FixedOffset>) -> ReportRecord {
        let cell = |column: &Option<String>| column.as_ref().and_then(|c| row.get(c));

        let sample_name = self
            .identity()
            .and_then(|column| row.get(column))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_SAMPLE)
            .to_string();

        let timestamp = cell(&self.timestamp)
            .and_then(|v| parse_timestamp(v))
            .unwrap_or(now);

        let number = |column: &Option<String>| cell(column).map_or(0.0, |v| parse_float_prefix(v));

        ReportRecord {
            sample_name,
            timestamp,
            thc: number(&self.thc),
            cbd: number(&self.cbd),
            moisture: number(&self.moisture),
            water_activity: number(&self.water_activity),
        }
    }
}

/// Resolves a row against its header list, defaulting the timestamp to now.
pub fn resolve_record(row: &HashMap<String, String>, headers: &[String]) -> ReportRecord {
    ColumnMap::resolve(headers).record(row, Utc::now().fixed_offset())
}

fn first_matching(headers: &[String], candidates: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|h| {
            let lower = h.to_lowercase();
            candidates.iter().any(|c| lower.contains(c))
        })
        .cloned()
}

fn exact_or_containing(headers: &[String], needle: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.to_lowercase() == needle)
        .or_else(|| headers.iter().find(|h| h.to_lowercase().contains(needle)))
        .cloned()
}

/// Parses the longest leading decimal number, so `"18.5 %"` yields 18.5.
/// Anything without a numeric prefix, or a non-finite result, yields 0.
pub fn parse_float_prefix(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    match s[..end].parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Accepts RFC 3339 plus a few common naive layouts; naive values are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    None
}
