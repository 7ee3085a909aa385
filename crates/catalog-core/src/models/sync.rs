use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

/// Endpoint status values
pub const ENDPOINT_ACTIVE: &str = "active";
pub const ENDPOINT_INACTIVE: &str = "inactive";
pub const ENDPOINT_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Upload,
    Download,
    Bidirectional,
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncDirection::Upload => write!(f, "upload"),
            SyncDirection::Download => write!(f, "download"),
            SyncDirection::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for SyncDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(SyncDirection::Upload),
            "download" => Ok(SyncDirection::Download),
            "bidirectional" => Ok(SyncDirection::Bidirectional),
            _ => Err(anyhow::anyhow!("Invalid sync direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl SyncFrequency {
    /// Gap between two runs; a month is taken as 30 days
    pub fn interval(&self) -> ChronoDuration {
        match self {
            SyncFrequency::Hourly => ChronoDuration::hours(1),
            SyncFrequency::Daily => ChronoDuration::days(1),
            SyncFrequency::Weekly => ChronoDuration::weeks(1),
            SyncFrequency::Monthly => ChronoDuration::days(30),
        }
    }
}

impl Display for SyncFrequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncFrequency::Hourly => write!(f, "hourly"),
            SyncFrequency::Daily => write!(f, "daily"),
            SyncFrequency::Weekly => write!(f, "weekly"),
            SyncFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for SyncFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(SyncFrequency::Hourly),
            "daily" => Ok(SyncFrequency::Daily),
            "weekly" => Ok(SyncFrequency::Weekly),
            "monthly" => Ok(SyncFrequency::Monthly),
            _ => Err(anyhow::anyhow!("Invalid sync frequency: {}", s)),
        }
    }
}

/// Remote location a user synchronizes with (webdav, cloud storage, local)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEndpoint {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    pub url: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub sync_direction: String,
    pub local_path: String,
    pub remote_path: Option<String>,
    pub sync_settings: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncEndpoint {
    pub fn new(
        user_id: i64,
        name: impl Into<String>,
        endpoint_type: impl Into<String>,
        url: impl Into<String>,
        local_path: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            name: name.into(),
            endpoint_type: endpoint_type.into(),
            url: url.into(),
            username: None,
            password: None,
            sync_direction: SyncDirection::Bidirectional.to_string(),
            local_path: local_path.into(),
            remote_path: None,
            sync_settings: None,
            status: ENDPOINT_ACTIVE.to_string(),
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            last_sync_at: None,
        }
    }
}

/// One run against an endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSession {
    pub id: i64,
    pub endpoint_id: i64,
    pub user_id: i64,
    pub status: String,
    pub sync_type: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub total_files: i32,
    pub synced_files: i32,
    pub failed_files: i32,
    pub skipped_files: i32,
    pub error_message: Option<String>,
}

impl SyncSession {
    /// Running session started now
    pub fn start(endpoint_id: i64, user_id: i64, sync_type: impl Into<String>) -> Self {
        Self {
            id: 0,
            endpoint_id,
            user_id,
            status: "running".to_string(),
            sync_type: sync_type.into(),
            started_at: Utc::now(),
            completed_at: None,
            duration: None,
            total_files: 0,
            synced_files: 0,
            failed_files: 0,
            skipped_files: 0,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncSchedule {
    pub id: i64,
    pub endpoint_id: i64,
    pub user_id: i64,
    pub frequency: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SyncSchedule {
    pub fn new(endpoint_id: i64, user_id: i64, frequency: SyncFrequency) -> Self {
        Self {
            id: 0,
            endpoint_id,
            user_id,
            frequency: frequency.to_string(),
            last_run: None,
            next_run: None,
            is_active: true,
            created_at: DateTime::<Utc>::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_sessions: i64,
    pub total_files_synced: i64,
    pub total_files_failed: i64,
    pub by_status: HashMap<String, i64>,
    pub by_type: HashMap<String, i64>,
    pub average_duration: Option<Duration>,
    pub success_rate: f64,
}
