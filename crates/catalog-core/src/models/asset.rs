use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const ASSET_STATUS_PENDING: &str = "pending";
pub const ASSET_STATUS_RESOLVING: &str = "resolving";
pub const ASSET_STATUS_READY: &str = "ready";
pub const ASSET_STATUS_FAILED: &str = "failed";
pub const ASSET_STATUS_EXPIRED: &str = "expired";

/// A lazily resolved artifact (thumbnail, poster, subtitle...) attached to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Pending asset with a fresh id
    pub fn new(asset_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            asset_type: asset_type.into(),
            status: ASSET_STATUS_PENDING.to_string(),
            content_type: String::new(),
            size: 0,
            source_hint: String::new(),
            entity_type: String::new(),
            entity_id: String::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
            expires_at: None,
        }
    }

    pub fn for_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self.entity_id = entity_id.into();
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ASSET_STATUS_PENDING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_asset_is_pending_with_unique_id() {
        let a = Asset::new("thumbnail").for_entity("media_item", "42");
        let b = Asset::new("thumbnail");
        assert!(a.is_pending());
        assert_ne!(a.id, b.id);
        assert_eq!(a.entity_id, "42");
    }

    #[test]
    fn type_field_is_serialized_as_type() {
        let value = serde_json::to_value(Asset::new("poster")).unwrap();
        assert_eq!(value["type"], "poster");
        assert!(value.get("entity_type").is_none());
    }
}
