use catalog_core::{
    models::{Favorite, FavoriteCategory, FavoriteShare, SharePermissions},
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};
use std::collections::HashMap;

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const FAVORITE_COLUMNS: &str =
    "id, user_id, entity_type, entity_id, category, notes, tags, is_public, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, user_id, name, description, color, icon, is_public, created_at, updated_at";

#[derive(Debug, FromRow)]
struct FavoriteRow {
    id: i64,
    user_id: i64,
    entity_type: String,
    entity_id: i64,
    category: Option<String>,
    notes: Option<String>,
    tags: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Favorite {
            id: row.id,
            user_id: row.user_id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            category: row.category,
            notes: row.notes,
            tags: json::decode_or_default(row.tags.as_deref(), "favorites.tags"),
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ShareRow {
    id: i64,
    favorite_id: i64,
    shared_by_user: i64,
    shared_with: Option<String>,
    permissions: Option<String>,
    created_at: DateTime<Utc>,
    is_active: bool,
}

impl TryFrom<ShareRow> for FavoriteShare {
    type Error = AppError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        Ok(FavoriteShare {
            id: row.id,
            favorite_id: row.favorite_id,
            shared_by_user: row.shared_by_user,
            shared_with: json::decode(row.shared_with.as_deref())?.unwrap_or_default(),
            permissions: json::decode::<SharePermissions>(row.permissions.as_deref())?.unwrap_or_default(),
            created_at: row.created_at,
            is_active: row.is_active,
        })
    }
}

/// Favorites, favorite categories and favorite shares
#[derive(Clone)]
pub struct FavoritesRepository {
    db: Database,
}

impl FavoritesRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn fetch_favorites(&self, mut qb: QueryBuilder<'_, Db>) -> Result<Vec<Favorite>, AppError> {
        let rows = qb.build_query_as::<FavoriteRow>().fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    #[tracing::instrument(skip(self, favorite), fields(db.table = "favorites", db.operation = "insert", user_id = %favorite.user_id))]
    pub async fn create_favorite(&self, favorite: &mut Favorite) -> Result<i64, AppError> {
        favorite.created_at = json::or_now(favorite.created_at, Utc::now());
        let tags = json::encode_list(&favorite.tags)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO favorites (user_id, entity_type, entity_id, category, notes, tags, is_public, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(favorite.user_id)
            .push_bind(&favorite.entity_type)
            .push_bind(favorite.entity_id)
            .push_bind(favorite.category.as_deref())
            .push_bind(favorite.notes.as_deref())
            .push_bind(tags)
            .push_bind(favorite.is_public)
            .push_bind(favorite.created_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        favorite.id = id;
        Ok(id)
    }

    /// The user's favorite on one entity, if any
    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select", user_id = %user_id))]
    pub async fn get_favorite(
        &self,
        user_id: i64,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Option<Favorite>, AppError> {
        let sql = format!(
            "SELECT {} FROM favorites WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3",
            FAVORITE_COLUMNS
        );
        let row = sqlx::query_as::<Db, FavoriteRow>(&sql)
            .bind(user_id)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(Favorite::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select", db.record_id = %id))]
    pub async fn get_favorite_by_id(&self, id: i64) -> Result<Favorite, AppError> {
        let sql = format!("SELECT {} FROM favorites WHERE id = $1", FAVORITE_COLUMNS);
        let row = sqlx::query_as::<Db, FavoriteRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("favorite not found".to_string()))?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self, favorite), fields(db.table = "favorites", db.operation = "update", db.record_id = %favorite.id))]
    pub async fn update_favorite(&self, favorite: &Favorite) -> Result<(), AppError> {
        let tags = json::encode_list(&favorite.tags)?;

        sqlx::query(
            "UPDATE favorites SET category = $1, notes = $2, tags = $3, is_public = $4, updated_at = $5 WHERE id = $6",
        )
        .bind(favorite.category.as_deref())
        .bind(favorite.notes.as_deref())
        .bind(tags)
        .bind(favorite.is_public)
        .bind(Utc::now())
        .bind(favorite.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "delete", user_id = %user_id))]
    pub async fn delete_favorite(&self, user_id: i64, entity_type: &str, entity_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3")
            .bind(user_id)
            .bind(entity_type)
            .bind(entity_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_favorites(
        &self,
        user_id: i64,
        entity_type: Option<&str>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Favorite>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM favorites WHERE user_id = ", FAVORITE_COLUMNS));
        qb.push_bind(user_id);
        if let Some(entity_type) = entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        self.fetch_favorites(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select_list"))]
    pub async fn get_public_favorites(
        &self,
        entity_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Favorite>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!(
            "SELECT {} FROM favorites WHERE is_public = TRUE",
            FAVORITE_COLUMNS
        ));
        if let Some(entity_type) = entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        self.fetch_favorites(qb).await
    }

    /// Substring match on notes or the raw tag list
    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select_list", user_id = %user_id))]
    pub async fn search_favorites(
        &self,
        user_id: i64,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Favorite>, AppError> {
        let pattern = format!("%{}%", query);
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM favorites WHERE user_id = ", FAVORITE_COLUMNS));
        qb.push_bind(user_id)
            .push(" AND (notes LIKE ")
            .push_bind(pattern.clone())
            .push(" OR tags LIKE ")
            .push_bind(pattern)
            .push(") ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        self.fetch_favorites(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "count", user_id = %user_id))]
    pub async fn count_user_favorites(&self, user_id: i64, entity_type: Option<&str>) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Db>::new("SELECT COUNT(*) FROM favorites WHERE user_id = ");
        qb.push_bind(user_id);
        if let Some(entity_type) = entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
        let count: i64 = qb.build_query_scalar().fetch_one(self.db.pool()).await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_favorites_count_by_entity_type(&self, user_id: i64) -> Result<HashMap<String, i64>, AppError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT entity_type, COUNT(*) FROM favorites WHERE user_id = $1 GROUP BY entity_type")
                .bind(user_id)
                .fetch_all(self.db.pool())
                .await?;
        Ok(stats::to_count_map(rows))
    }

    /// Counts per category name; favorites without one count as "uncategorized"
    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_favorites_count_by_category(&self, user_id: i64) -> Result<HashMap<String, i64>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(category, 'uncategorized'), COUNT(*) FROM favorites WHERE user_id = $1 GROUP BY category",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(stats::to_count_map(rows))
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_recent_favorites(&self, user_id: i64, limit: i64) -> Result<Vec<Favorite>, AppError> {
        let sql = format!(
            "SELECT {} FROM favorites WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            FAVORITE_COLUMNS
        );
        let rows = sqlx::query_as::<Db, FavoriteRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    /// Other users' public favorites of the same entity type, the same entity first
    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_similar_favorites(
        &self,
        user_id: i64,
        entity_type: &str,
        entity_id: i64,
        limit: i64,
    ) -> Result<Vec<Favorite>, AppError> {
        let sql = format!(
            "SELECT {} FROM favorites \
             WHERE user_id <> $1 AND entity_type = $2 AND is_public = TRUE \
             ORDER BY CASE WHEN entity_id = $3 THEN 0 ELSE 1 END, created_at DESC, id DESC \
             LIMIT $4",
            FAVORITE_COLUMNS
        );
        let rows = sqlx::query_as::<Db, FavoriteRow>(&sql)
            .bind(user_id)
            .bind(entity_type)
            .bind(entity_id)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    #[tracing::instrument(skip(self, category), fields(db.table = "favorite_categories", db.operation = "insert", user_id = %category.user_id))]
    pub async fn create_favorite_category(&self, category: &mut FavoriteCategory) -> Result<i64, AppError> {
        category.created_at = json::or_now(category.created_at, Utc::now());

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO favorite_categories (user_id, name, description, color, icon, is_public, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(category.user_id)
            .push_bind(&category.name)
            .push_bind(category.description.as_deref())
            .push_bind(category.color.as_deref())
            .push_bind(category.icon.as_deref())
            .push_bind(category.is_public)
            .push_bind(category.created_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        category.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorite_categories", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_favorite_categories(&self, user_id: i64) -> Result<Vec<FavoriteCategory>, AppError> {
        let sql = format!(
            "SELECT {} FROM favorite_categories WHERE user_id = $1 ORDER BY name ASC",
            CATEGORY_COLUMNS
        );
        let categories = sqlx::query_as::<Db, FavoriteCategory>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(categories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorite_categories", db.operation = "select", db.record_id = %id))]
    pub async fn get_favorite_category_by_id(&self, id: i64) -> Result<FavoriteCategory, AppError> {
        let sql = format!("SELECT {} FROM favorite_categories WHERE id = $1", CATEGORY_COLUMNS);
        sqlx::query_as::<Db, FavoriteCategory>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("favorite category not found".to_string()))
    }

    #[tracing::instrument(skip(self, category), fields(db.table = "favorite_categories", db.operation = "update", db.record_id = %category.id))]
    pub async fn update_favorite_category(&self, category: &FavoriteCategory) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE favorite_categories
            SET name = $1, description = $2, color = $3, icon = $4, is_public = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&category.name)
        .bind(category.description.as_deref())
        .bind(category.color.as_deref())
        .bind(category.icon.as_deref())
        .bind(category.is_public)
        .bind(Utc::now())
        .bind(category.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("favorite category not found".to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorite_categories", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_favorite_category(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM favorite_categories WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Favorites of the user filed under the category's name
    #[tracing::instrument(skip(self), fields(db.table = "favorites", db.operation = "count", user_id = %user_id))]
    pub async fn count_favorites_by_category(&self, user_id: i64, category_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM favorites \
             WHERE user_id = $1 AND category = (SELECT name FROM favorite_categories WHERE id = $2)",
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self, share), fields(db.table = "favorite_shares", db.operation = "insert", favorite_id = %share.favorite_id))]
    pub async fn create_favorite_share(&self, share: &mut FavoriteShare) -> Result<i64, AppError> {
        share.created_at = json::or_now(share.created_at, Utc::now());
        let shared_with = json::encode(&share.shared_with)?;
        let permissions = json::encode(&share.permissions)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO favorite_shares (favorite_id, shared_by_user, shared_with, permissions, created_at, is_active) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(share.favorite_id)
            .push_bind(share.shared_by_user)
            .push_bind(shared_with)
            .push_bind(permissions)
            .push_bind(share.created_at)
            .push_bind(share.is_active);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        share.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorite_shares", db.operation = "select", db.record_id = %id))]
    pub async fn get_favorite_share_by_id(&self, id: i64) -> Result<FavoriteShare, AppError> {
        let row = sqlx::query_as::<Db, ShareRow>(
            "SELECT id, favorite_id, shared_by_user, shared_with, permissions, created_at, is_active \
             FROM favorite_shares WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("favorite share not found".to_string()))?;
        row.try_into()
    }

    /// Favorites reachable through an active share naming the user
    #[tracing::instrument(skip(self), fields(db.table = "favorite_shares", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_shared_favorites(&self, user_id: i64) -> Result<Vec<Favorite>, AppError> {
        // LIKE narrows the candidates; the decoded recipient list decides
        let candidates = sqlx::query_as::<Db, ShareRow>(
            "SELECT id, favorite_id, shared_by_user, shared_with, permissions, created_at, is_active \
             FROM favorite_shares WHERE is_active = TRUE AND shared_with LIKE $1",
        )
        .bind(format!("%{}%", user_id))
        .fetch_all(self.db.pool())
        .await?;

        let mut favorite_ids = Vec::new();
        for row in candidates {
            let share = FavoriteShare::try_from(row)?;
            if share.is_shared_with(user_id) && !favorite_ids.contains(&share.favorite_id) {
                favorite_ids.push(share.favorite_id);
            }
        }
        if favorite_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM favorites WHERE id IN (", FAVORITE_COLUMNS));
        let mut ids = qb.separated(", ");
        for id in &favorite_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY created_at DESC, id DESC");
        self.fetch_favorites(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "favorite_shares", db.operation = "update", db.record_id = %id))]
    pub async fn revoke_favorite_share(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE favorite_shares SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
