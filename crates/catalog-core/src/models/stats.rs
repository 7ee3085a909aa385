use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog-wide totals over live (non-deleted) files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OverallStats {
    pub total_files: i64,
    pub total_directories: i64,
    pub total_size: i64,
    pub total_duplicates: i64,
    pub duplicate_groups: i64,
    pub storage_roots_count: i64,
    pub active_storage_roots: i64,
    pub last_scan_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StorageRootStats {
    pub name: String,
    pub total_files: i64,
    pub total_directories: i64,
    pub total_size: i64,
    pub duplicate_files: i64,
    pub duplicate_groups: i64,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub is_online: bool,
}

/// Count and size per `(file_type, extension)` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileTypeStats {
    pub file_type: String,
    pub extension: String,
    pub count: i64,
    pub total_size: i64,
    pub average_size: f64,
}

/// File counts per size bucket
///
/// Buckets: tiny < 1 KiB (empty files included), small < 1 MiB,
/// medium < 10 MiB, large < 100 MiB, huge < 1 GiB, massive otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SizeDistribution {
    pub tiny: i64,
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub huge: i64,
    pub massive: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DuplicateStats {
    pub total_duplicates: i64,
    pub duplicate_groups: i64,
    pub wasted_space: i64,
    pub largest_duplicate_group: i64,
    pub average_group_size: f64,
}

/// One group of identical files with the space its extra copies take
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroupStats {
    pub group_id: i64,
    pub file_count: i64,
    pub total_size: i64,
    pub wasted_space: i64,
    pub sample_path: Option<String>,
}

/// Ordering for [`DuplicateGroupStats`] listings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSort {
    #[default]
    Count,
    Size,
}

impl fmt::Display for DuplicateSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateSort::Count => write!(f, "count"),
            DuplicateSort::Size => write!(f, "size"),
        }
    }
}

impl FromStr for DuplicateSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(DuplicateSort::Count),
            "size" => Ok(DuplicateSort::Size),
            _ => Err(anyhow::anyhow!("Invalid duplicate sort: {}", s)),
        }
    }
}

/// File access over a trailing window of days
///
/// `access_frequency` holds one count per day, oldest first, ending today.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessPatterns {
    pub recently_accessed: i64,
    pub never_accessed: i64,
    pub access_frequency: Vec<i64>,
    pub popular_extensions: Vec<String>,
    pub popular_directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyGrowth {
    /// `YYYY-MM`
    pub month: String,
    pub files_added: i64,
    pub size_added: i64,
    pub total_files: i64,
    pub total_size: i64,
}

/// Files added per month over a window of months
///
/// Growth rates are percentages relative to the live files that existed when
/// the window opened; `total_growth_rate` averages the file and size rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthTrends {
    pub monthly_growth: Vec<MonthlyGrowth>,
    pub total_growth_rate: f64,
    pub file_growth_rate: f64,
    pub size_growth_rate: f64,
}

/// One recorded scan of a storage root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ScanHistoryItem {
    pub id: i64,
    pub storage_root_name: String,
    pub scan_type: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub files_processed: i64,
    pub files_added: i64,
    pub files_updated: i64,
    pub files_deleted: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScanHistory {
    pub storage_root_id: i64,
    pub scan_type: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub files_processed: i64,
    pub files_added: i64,
    pub files_updated: i64,
    pub files_deleted: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
}

impl NewScanHistory {
    /// A running scan started now
    pub fn started(storage_root_id: i64, scan_type: impl Into<String>) -> Self {
        Self {
            storage_root_id,
            scan_type: scan_type.into(),
            status: "running".to_string(),
            start_time: Utc::now(),
            end_time: None,
            files_processed: 0,
            files_added: 0,
            files_updated: 0,
            files_deleted: 0,
            error_count: 0,
            error_message: None,
        }
    }
}
