use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scanned filesystem entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct File {
    pub id: i64,
    pub storage_root_id: i64,
    pub storage_root_name: String,
    pub path: String,
    pub name: String,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub file_type: Option<String>,
    pub size: i64,
    pub is_directory: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_scan_at: DateTime<Utc>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub md5: Option<String>,
    pub sha256: Option<String>,
    pub sha1: Option<String>,
    pub blake3: Option<String>,
    pub quick_hash: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_group_id: Option<i64>,
    pub parent_id: Option<i64>,
}

/// Input for recording a scanned file or directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFile {
    pub storage_root_id: i64,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub blake3: Option<String>,
    #[serde(default)]
    pub quick_hash: Option<String>,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub duplicate_group_id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// A storage location reachable over smb, ftp, nfs, webdav or the local filesystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StorageRoot {
    pub id: i64,
    pub name: String,
    pub protocol: String,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub path: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub domain: Option<String>,
    pub mount_point: Option<String>,
    pub options: Option<String>,
    pub url: Option<String>,
    pub enabled: bool,
    pub max_depth: i32,
    pub enable_duplicate_detection: bool,
    pub enable_metadata_extraction: bool,
    pub include_patterns: Option<String>,
    pub exclude_patterns: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStorageRoot {
    pub name: String,
    pub protocol: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub mount_point: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub enabled: bool,
    pub max_depth: i32,
    pub enable_duplicate_detection: bool,
    pub enable_metadata_extraction: bool,
    #[serde(default)]
    pub include_patterns: Option<String>,
    #[serde(default)]
    pub exclude_patterns: Option<String>,
}

impl NewStorageRoot {
    /// Enabled root with scanning defaults
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            host: None,
            port: None,
            path: None,
            username: None,
            password: None,
            domain: None,
            mount_point: None,
            options: None,
            url: None,
            enabled: true,
            max_depth: 10,
            enable_duplicate_detection: true,
            enable_metadata_extraction: true,
            include_patterns: None,
            exclude_patterns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileMetadata {
    pub id: i64,
    pub file_id: i64,
    pub key: String,
    pub value: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWithMetadata {
    #[serde(flatten)]
    pub file: File,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<FileMetadata>,
}

/// Aggregate over everything below a directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DirectoryInfo {
    pub path: String,
    pub name: String,
    pub storage_root_name: String,
    pub file_count: i64,
    pub directory_count: i64,
    pub total_size: i64,
    pub duplicate_count: i64,
    pub modified_at: DateTime<Utc>,
}

/// File search criteria; empty strings and `None` leave a criterion out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    pub query: String,
    pub path: String,
    pub name: String,
    pub extension: String,
    pub file_type: String,
    pub mime_type: String,
    pub storage_roots: Vec<String>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub include_deleted: bool,
    pub only_duplicates: bool,
    pub exclude_duplicates: bool,
    pub include_directories: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Size,
    ModifiedAt,
    CreatedAt,
    Path,
    Extension,
}

impl SortField {
    /// Unknown field names sort by name
    pub fn parse(field: &str) -> Self {
        match field {
            "size" => SortField::Size,
            "modified_at" => SortField::ModifiedAt,
            "created_at" => SortField::CreatedAt,
            "path" => SortField::Path,
            "extension" => SortField::Extension,
            _ => SortField::Name,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "f.name",
            SortField::Size => "f.size",
            SortField::ModifiedAt => "f.modified_at",
            SortField::CreatedAt => "f.created_at",
            SortField::Path => "f.path",
            SortField::Extension => "f.extension",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Only "desc" sorts descending
    pub fn parse(order: &str) -> Self {
        if order == "desc" {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortOptions {
    pub fn new(field: &str, order: &str) -> Self {
        Self {
            field: SortField::parse(field),
            order: SortOrder::parse(order),
        }
    }

    pub fn order_by_clause(&self) -> String {
        format!(" ORDER BY {} {}", self.field.column(), self.order.keyword())
    }
}

/// 1-based page number and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub page: i64,
    pub limit: i64,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

impl PaginationOptions {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        total.max(0).saturating_add(self.limit - 1) / self.limit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub files: Vec<FileWithMetadata>,
    pub total_count: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}
