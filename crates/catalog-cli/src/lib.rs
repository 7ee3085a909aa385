//! Shared pieces of the `catalog` maintenance binary: logging setup, output
//! formatting and retention cutoffs.

use std::collections::BTreeMap;
use std::fmt::Write;

use catalog_core::{
    models::{CrashStatistics, DuplicateEntityGroup, ErrorStatistics},
    RetentionConfig,
};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use tracing_subscriber::{fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for commands that print data
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Log line format, picked with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) falls back to compact output.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize tracing for the CLI.
///
/// `RUST_LOG` controls the filter (default `info`); logs go to stderr so
/// command output on stdout stays machine readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = LogFormat::from_value(std::env::var("LOG_FORMAT").ok().as_deref());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Compact => {
            let console_fmt = tracing_subscriber::fmt::layer()
                .event_format(Format::default().compact().with_target(false))
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(console_fmt).init();
        }
    }
}

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Catalog-wide counters printed by `catalog stats`
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub backend: String,
    pub configuration_version: Option<String>,
    pub total_users: i64,
    pub total_media_items: i64,
    pub media_items_by_type: BTreeMap<String, i64>,
    pub duplicate_groups: i64,
    pub active_conversion_jobs: i64,
    /// Present when `stats` is run for one user
    pub crash_statistics: Option<CrashStatistics>,
    pub error_statistics: Option<ErrorStatistics>,
}

pub fn render_summary(summary: &CatalogSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Catalog Statistics ===");
    let _ = writeln!(out);
    let _ = writeln!(out, "Backend:          {}", summary.backend);
    let _ = writeln!(
        out,
        "Configuration:    {}",
        summary.configuration_version.as_deref().unwrap_or("not configured")
    );
    let _ = writeln!(out, "Users:            {:>8}", summary.total_users);
    let _ = writeln!(out, "Media items:      {:>8}", summary.total_media_items);
    let _ = writeln!(out, "Duplicate groups: {:>8}", summary.duplicate_groups);
    let _ = writeln!(out, "Active jobs:      {:>8}", summary.active_conversion_jobs);

    let _ = writeln!(out);
    let _ = writeln!(out, "--- By Type ---");
    for (media_type, count) in &summary.media_items_by_type {
        let _ = writeln!(out, "{:<16}  {:>8}", media_type, count);
    }

    if let Some(crashes) = &summary.crash_statistics {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Crashes ---");
        let _ = writeln!(out, "Total:            {:>8}", crashes.total_crashes);
        let _ = writeln!(out, "Last 24h:         {:>8}", crashes.recent_crashes);
        let _ = writeln!(out, "Resolved:         {:>8}", crashes.resolved_crashes);
        let _ = writeln!(out, "Per day:          {:>8.2}", crashes.crash_rate);
    }
    if let Some(errors) = &summary.error_statistics {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Errors ---");
        let _ = writeln!(out, "Total:            {:>8}", errors.total_errors);
        let _ = writeln!(out, "Last 24h:         {:>8}", errors.recent_errors);
        let _ = writeln!(out, "Resolved:         {:>8}", errors.resolved_errors);
        let _ = writeln!(out, "Avg fix (hours):  {:>8.1}", errors.avg_resolution_time);
    }
    out
}

/// Duplicate groups as a fixed-width table
pub fn render_duplicates(groups: &[DuplicateEntityGroup], total: i64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<40}  {:<12}  {:>6}  {:>5}  IDS", "TITLE", "TYPE", "YEAR", "COUNT");
    for group in groups {
        let year = group.year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        let ids = group
            .entity_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(
            out,
            "{:<40}  {:<12}  {:>6}  {:>5}  {}",
            truncate_string(&group.title, 40),
            group.media_type,
            year,
            group.count,
            ids
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{} of {} duplicate groups", groups.len(), total);
    out
}

/// Timestamps before which each kind of data is eligible for cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCutoffs {
    pub sessions: DateTime<Utc>,
    pub reports: DateTime<Utc>,
    pub jobs: DateTime<Utc>,
    pub logs: DateTime<Utc>,
    pub config_history: DateTime<Utc>,
}

impl RetentionCutoffs {
    pub fn from_config(retention: &RetentionConfig, now: DateTime<Utc>) -> Self {
        Self {
            sessions: now - retention.session_retention(),
            reports: now - retention.report_retention(),
            jobs: now - retention.job_retention(),
            logs: now - retention.log_retention(),
            config_history: now - retention.config_history_retention(),
        }
    }

    /// Every cleanup target with its cutoff, in the order `cleanup` runs them
    pub fn targets(&self) -> Vec<(&'static str, DateTime<Utc>)> {
        vec![
            ("user sessions", self.sessions),
            ("error reports", self.reports),
            ("crash reports", self.reports),
            ("conversion jobs", self.jobs),
            ("sync sessions", self.jobs),
            ("stress test executions", self.jobs),
            ("log collections", self.logs),
            ("configuration history", self.config_history),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
        assert_eq!(truncate_string("hello", 5), "hello");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_counts_characters() {
        assert_eq!(truncate_string("Amélie Poulain", 9), "Amélie...");
        assert_eq!(truncate_string("千と千尋の神隠し", 8), "千と千尋の神隠し");
    }

    #[test]
    fn log_format_values() {
        assert_eq!(LogFormat::from_value(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_value(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::from_value(Some("pretty")), LogFormat::Compact);
        assert_eq!(LogFormat::from_value(None), LogFormat::Compact);
    }

    #[test]
    fn cutoffs_follow_retention_windows() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let retention = RetentionConfig {
            session_retention_days: 7,
            ..Default::default()
        };
        let cutoffs = RetentionCutoffs::from_config(&retention, now);

        assert_eq!(cutoffs.sessions, now - Duration::days(7));
        assert_eq!(cutoffs.reports, now - Duration::days(retention.report_retention_days));
        assert_eq!(cutoffs.config_history, now - Duration::days(retention.config_history_retention_days));

        let targets = cutoffs.targets();
        assert_eq!(targets.len(), 8);
        assert_eq!(targets[0], ("user sessions", cutoffs.sessions));
        assert!(targets.iter().all(|(_, cutoff)| *cutoff < now));
    }

    #[test]
    fn summary_table_lists_types_in_order() {
        let summary = CatalogSummary {
            backend: "sqlite".to_string(),
            configuration_version: None,
            total_users: 3,
            total_media_items: 5,
            media_items_by_type: BTreeMap::from([("movie".to_string(), 4), ("book".to_string(), 1)]),
            duplicate_groups: 1,
            active_conversion_jobs: 2,
            crash_statistics: None,
            error_statistics: None,
        };
        let table = render_summary(&summary);

        assert!(table.contains("Backend:          sqlite"));
        assert!(table.contains("not configured"));
        assert!(table.contains("Active jobs:             2"));
        assert!(!table.contains("--- Crashes ---"));
        let book = table.find("book").unwrap();
        let movie = table.find("movie").unwrap();
        assert!(book < movie);
    }

    #[test]
    fn summary_table_includes_user_reports() {
        let summary = CatalogSummary {
            backend: "sqlite".to_string(),
            configuration_version: Some("1.2.0".to_string()),
            total_users: 1,
            total_media_items: 0,
            media_items_by_type: BTreeMap::new(),
            duplicate_groups: 0,
            active_conversion_jobs: 0,
            crash_statistics: Some(CrashStatistics {
                total_crashes: 3,
                crashes_by_signal: Default::default(),
                recent_crashes: 1,
                resolved_crashes: 2,
                avg_resolution_time: 1.5,
                crash_rate: 0.1,
            }),
            error_statistics: None,
        };
        let table = render_summary(&summary);

        assert!(table.contains("1.2.0"));
        assert!(table.contains("--- Crashes ---"));
        assert!(table.contains("Per day:              0.10"));
        assert!(!table.contains("--- Errors ---"));
    }

    #[test]
    fn duplicates_table_shows_missing_year_and_ids() {
        let groups = vec![DuplicateEntityGroup {
            title: "Dune".to_string(),
            media_type: "movie".to_string(),
            year: None,
            count: 2,
            entity_ids: vec![4, 9],
        }];
        let table = render_duplicates(&groups, 3);

        let row = table.lines().nth(1).unwrap();
        assert!(row.starts_with("Dune"));
        assert!(row.contains("     -"));
        assert!(row.ends_with("4,9"));
        assert!(table.contains("1 of 3 duplicate groups"));
    }
}
