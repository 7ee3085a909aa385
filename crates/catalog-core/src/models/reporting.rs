use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Report status values shared by crash and error reports
pub const REPORT_STATUS_NEW: &str = "new";
pub const REPORT_STATUS_IN_PROGRESS: &str = "in_progress";
pub const REPORT_STATUS_RESOLVED: &str = "resolved";
pub const REPORT_STATUS_IGNORED: &str = "ignored";

/// Severity of an error report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl ErrorLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Debug => "debug",
            ErrorLevel::Info => "info",
            ErrorLevel::Warning => "warning",
            ErrorLevel::Error => "error",
            ErrorLevel::Fatal => "fatal",
        }
    }
}

/// Client-side error report; recurring errors share a fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: i64,
    pub user_id: i64,
    pub level: String,
    pub message: String,
    pub error_code: Option<String>,
    pub component: Option<String>,
    pub stack_trace: Option<String>,
    pub context: HashMap<String, Value>,
    pub system_info: HashMap<String, Value>,
    pub user_agent: Option<String>,
    pub url: Option<String>,
    pub fingerprint: String,
    pub status: String,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ErrorReport {
    pub fn new(
        user_id: i64,
        level: ErrorLevel,
        message: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            level: level.as_str().to_string(),
            message: message.into(),
            error_code: None,
            component: None,
            stack_trace: None,
            context: HashMap::new(),
            system_info: HashMap::new(),
            user_agent: None,
            url: None,
            fingerprint: fingerprint.into(),
            status: REPORT_STATUS_NEW.to_string(),
            reported_at: DateTime::<Utc>::default(),
            resolved_at: None,
        }
    }

    /// Mark resolved at `at`
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = REPORT_STATUS_RESOLVED.to_string();
        self.resolved_at = Some(at);
    }
}

/// Native crash report keyed by the terminating signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashReport {
    pub id: i64,
    pub user_id: i64,
    pub signal: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub context: HashMap<String, Value>,
    pub system_info: HashMap<String, Value>,
    pub fingerprint: String,
    pub status: String,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CrashReport {
    pub fn new(
        user_id: i64,
        signal: impl Into<String>,
        message: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            signal: signal.into(),
            message: message.into(),
            stack_trace: None,
            context: HashMap::new(),
            system_info: HashMap::new(),
            fingerprint: fingerprint.into(),
            status: REPORT_STATUS_NEW.to_string(),
            reported_at: DateTime::<Utc>::default(),
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = REPORT_STATUS_RESOLVED.to_string();
        self.resolved_at = Some(at);
    }
}

/// Narrowing for error report listings; `limit <= 0` means unbounded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorReportFilters {
    pub level: Option<String>,
    pub component: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashReportFilters {
    pub signal: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub total_errors: i64,
    pub errors_by_level: HashMap<String, i64>,
    pub errors_by_component: HashMap<String, i64>,
    pub recent_errors: i64,
    pub resolved_errors: i64,
    /// Hours
    pub avg_resolution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashStatistics {
    pub total_crashes: i64,
    pub crashes_by_signal: HashMap<String, i64>,
    pub recent_crashes: i64,
    pub resolved_crashes: i64,
    /// Hours
    pub avg_resolution_time: f64,
    /// Crashes per day over the last 30 days
    pub crash_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TopError {
    pub fingerprint: String,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub message: String,
    pub component: Option<String>,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TopCrash {
    pub fingerprint: String,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub message: String,
    pub signal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CrashTrend {
    pub date: NaiveDate,
    pub count: i64,
}
