// Text rendering of lap times, sector times and dates

use chrono::NaiveDate;

use super::valid_duration;
use crate::api::types::parse_timestamp;

pub const PLACEHOLDER_LAP_TIME: &str = "--:--";
pub const PLACEHOLDER_SECONDS: &str = "--";

/// Render a lap time as `m:ss.sss`, or `--:--` when there is no valid time.
pub fn format_lap_time(seconds: Option<f64>) -> String {
    let Some(seconds) = valid_duration(seconds) else {
        return PLACEHOLDER_LAP_TIME.to_string();
    };
    // round once so 59.9996 becomes 1:00.000 and never 0:60.000
    let total_millis = (seconds * 1000.).round() as u64;
    let minutes = total_millis / 60_000;
    let millis = total_millis % 60_000;
    format!("{}:{:02}.{:03}", minutes, millis / 1000, millis % 1000)
}

/// Render a sector or gap time as `s.sss`, or `--`.
pub fn format_seconds(seconds: Option<f64>) -> String {
    match valid_duration(seconds) {
        Some(seconds) => format!("{:.3}", seconds),
        None => PLACEHOLDER_SECONDS.to_string(),
    }
}

/// Render an API date such as `2024-03-02T15:00:00+00:00` as `Sat, Mar 2, 2024`.
/// Unparseable input is returned unchanged.
pub fn format_date(raw: &str) -> String {
    let date = parse_timestamp(raw)
        .map(|timestamp| timestamp.date_naive())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
    match date {
        Some(date) => date.format("%a, %b %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}
