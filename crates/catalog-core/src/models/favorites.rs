use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's bookmark on any catalog entity (media item, file, collection...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub category: Option<String>,
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Favorite {
    pub fn new(user_id: i64, entity_type: impl Into<String>, entity_id: i64) -> Self {
        Self {
            id: 0,
            user_id,
            entity_type: entity_type.into(),
            entity_id,
            category: None,
            notes: None,
            tags: Vec::new(),
            is_public: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FavoriteCategory {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FavoriteCategory {
    pub fn new(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id,
            name: name.into(),
            description: None,
            color: None,
            icon: None,
            is_public: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
        }
    }
}

/// Grant of one favorite to a list of other users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteShare {
    pub id: i64,
    pub favorite_id: i64,
    pub shared_by_user: i64,
    pub shared_with: Vec<i64>,
    pub permissions: SharePermissions,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl FavoriteShare {
    /// Active view-only share
    pub fn new(favorite_id: i64, shared_by_user: i64, shared_with: Vec<i64>) -> Self {
        Self {
            id: 0,
            favorite_id,
            shared_by_user,
            shared_with,
            permissions: SharePermissions {
                can_view: true,
                ..Default::default()
            },
            created_at: DateTime::<Utc>::default(),
            is_active: true,
        }
    }

    pub fn is_shared_with(&self, user_id: i64) -> bool {
        self.shared_with.contains(&user_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharePermissions {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_share: bool,
}
