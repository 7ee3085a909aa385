//! Small helpers shared by the statistics queries

use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::time::Duration;

/// Percentage of finished work that succeeded.
///
/// 100 when something completed and nothing failed, 0 when nothing finished.
pub fn success_rate(completed: i64, failed: i64) -> f64 {
    let finished = completed + failed;
    if finished <= 0 {
        0.0
    } else {
        completed as f64 / finished as f64 * 100.0
    }
}

/// Success rate from a by-status breakdown
pub fn success_rate_by_status(by_status: &HashMap<String, i64>) -> f64 {
    let completed = by_status.get("completed").copied().unwrap_or(0);
    let failed = by_status.get("failed").copied().unwrap_or(0);
    success_rate(completed, failed)
}

/// Stored whole seconds back to a duration; negative values are treated as missing
pub fn duration_from_secs(seconds: Option<i64>) -> Option<Duration> {
    seconds
        .and_then(|s| u64::try_from(s).ok())
        .map(Duration::from_secs)
}

/// Duration to whole seconds for storage
pub fn duration_to_secs(duration: Option<Duration>) -> Option<i64> {
    duration.map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Average seconds (possibly fractional) truncated to whole seconds
pub fn average_duration(avg_seconds: Option<f64>) -> Option<Duration> {
    avg_seconds
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| Duration::from_secs(s.trunc() as u64))
}

/// Collect `(key, count)` rows into a map
pub fn to_count_map(rows: Vec<(String, i64)>) -> HashMap<String, i64> {
    rows.into_iter().collect()
}

/// Percentage change from `first` to `last`; 0 when there is no baseline
pub fn growth_rate(first: i64, last: i64) -> f64 {
    if first <= 0 {
        0.0
    } else {
        (last - first) as f64 / first as f64 * 100.0
    }
}

/// Space taken by every copy but one in a group of equal-sized files
pub fn wasted_space(total_size: i64, file_count: i64) -> i64 {
    if file_count <= 1 {
        0
    } else {
        total_size - total_size / file_count
    }
}

/// Per-day counts for the `days` days ending at `end`, oldest first.
///
/// Days without a row are 0; rows outside the window are ignored.
pub fn daily_series(counts: &[(NaiveDate, i64)], end: NaiveDate, days: usize) -> Vec<i64> {
    let mut series = vec![0; days];
    for (date, count) in counts {
        let back = end.signed_duration_since(*date).num_days();
        if let Ok(back) = usize::try_from(back) {
            if back < days {
                series[days - 1 - back] += count;
            }
        }
    }
    series
}

/// First day of a window of `days` days ending at `end`
pub fn window_start(end: NaiveDate, days: usize) -> NaiveDate {
    let back = days.saturating_sub(1) as u64;
    end.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
}
