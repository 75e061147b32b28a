//! CF time-coordinate decoding ("<unit> since <epoch>").

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// How numeric time values map onto datetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEncoding {
    pub epoch: NaiveDateTime,
    /// Length of one unit in nanoseconds
    pub unit_ns: i64,
}

/// Parse CF units such as `days since 1981-01-01` or
/// `hours since 2000-01-01 00:00:00`.
pub fn parse_cf_time_units(units: &str) -> Option<TimeEncoding> {
    let (unit, epoch) = units.split_once(" since ")?;

    let unit_ns: i64 = match unit.trim().to_lowercase().as_str() {
        "nanoseconds" | "nanosecond" | "ns" => 1,
        "microseconds" | "microsecond" | "us" => 1_000,
        "milliseconds" | "millisecond" | "ms" => 1_000_000,
        "seconds" | "second" | "s" => 1_000_000_000,
        "minutes" | "minute" | "min" => 60 * 1_000_000_000,
        "hours" | "hour" | "h" | "hr" => 3600 * 1_000_000_000,
        "days" | "day" | "d" => 86400 * 1_000_000_000,
        other => {
            tracing::warn!(unit = other, units, "Unsupported CF time unit");
            return None;
        }
    };

    let epoch = parse_epoch(epoch.trim())?;
    Some(TimeEncoding { epoch, unit_ns })
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    // UTC markers carry no information for a naive timestamp
    let s = s
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim_end_matches(" +0000")
        .trim();

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Decode raw time values. Non-finite values are rejected.
pub fn decode_times(values: &[f64], encoding: &TimeEncoding) -> Result<Vec<NaiveDateTime>, String> {
    values
        .iter()
        .map(|&v| {
            let ns = v * encoding.unit_ns as f64;
            if !ns.is_finite() || ns.abs() >= i64::MAX as f64 {
                return Err(format!("time value {} is out of range", v));
            }
            Ok(encoding.epoch + Duration::nanoseconds(ns.round() as i64))
        })
        .collect()
}
