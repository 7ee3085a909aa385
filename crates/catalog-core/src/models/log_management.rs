use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub const COLLECTION_STATUS_PENDING: &str = "pending";
pub const COLLECTION_STATUS_IN_PROGRESS: &str = "in_progress";
pub const COLLECTION_STATUS_COMPLETED: &str = "completed";
pub const COLLECTION_STATUS_FAILED: &str = "failed";

/// A user-requested bundle of log entries from selected components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogCollection {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub components: Vec<String>,
    pub log_level: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub entry_count: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub filters: HashMap<String, Value>,
}

impl LogCollection {
    pub fn new(user_id: i64, name: impl Into<String>, components: Vec<String>) -> Self {
        Self {
            id: 0,
            user_id,
            name: name.into(),
            description: None,
            components,
            log_level: "info".to_string(),
            start_time: None,
            end_time: None,
            created_at: DateTime::<Utc>::default(),
            completed_at: None,
            status: COLLECTION_STATUS_PENDING.to_string(),
            entry_count: 0,
            filters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub collection_id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, Value>,
}

impl LogEntry {
    pub fn new(
        collection_id: i64,
        level: impl Into<String>,
        component: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            collection_id,
            timestamp: Utc::now(),
            level: level.into(),
            component: component.into(),
            message: message.into(),
            context: HashMap::new(),
        }
    }
}

/// Token-addressed access grant to a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogShare {
    pub id: i64,
    pub collection_id: i64,
    pub user_id: i64,
    pub share_token: String,
    pub share_type: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

impl LogShare {
    /// Active share with a freshly generated token
    pub fn new(
        collection_id: i64,
        user_id: i64,
        share_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            collection_id,
            user_id,
            share_token: Uuid::new_v4().simple().to_string(),
            share_type: share_type.into(),
            expires_at,
            created_at: DateTime::<Utc>::default(),
            accessed_at: None,
            is_active: true,
            permissions: vec!["read".to_string()],
            recipients: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Narrowing for entry listings; `limit <= 0` means unbounded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntryFilters {
    pub level: Option<String>,
    pub component: Option<String>,
    pub search: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStatistics {
    pub total_collections: i64,
    pub total_entries: i64,
    pub active_shares: i64,
    pub collections_by_status: HashMap<String, i64>,
    pub recent_collections: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn shares_get_distinct_tokens() {
        let expires = Utc::now() + Duration::days(1);
        let a = LogShare::new(1, 1, "link", expires);
        let b = LogShare::new(1, 1, "link", expires);
        assert_eq!(a.share_token.len(), 32);
        assert_ne!(a.share_token, b.share_token);
        assert!(a.is_active);
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let share = LogShare::new(1, 1, "link", now);
        assert!(share.is_expired(now));
        assert!(!share.is_expired(now - Duration::seconds(1)));
    }
}
