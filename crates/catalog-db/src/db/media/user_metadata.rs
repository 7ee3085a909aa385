use catalog_core::{models::UserMetadata, AppError};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::json;

const USER_METADATA_COLUMNS: &str = r#"
    id, media_item_id, user_id, user_rating, watched_status, watched_date,
    personal_notes, tags, favorite, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct UserMetadataRow {
    id: i64,
    media_item_id: i64,
    user_id: i64,
    user_rating: Option<f64>,
    watched_status: Option<String>,
    watched_date: Option<DateTime<Utc>>,
    personal_notes: Option<String>,
    tags: Option<String>,
    favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserMetadataRow> for UserMetadata {
    fn from(row: UserMetadataRow) -> Self {
        UserMetadata {
            id: row.id,
            media_item_id: row.media_item_id,
            user_id: row.user_id,
            user_rating: row.user_rating,
            watched_status: row.watched_status,
            watched_date: row.watched_date,
            personal_notes: row.personal_notes,
            tags: json::decode_or_default(row.tags.as_deref(), "tags"),
            favorite: row.favorite,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Ratings, watch state and notes a user keeps about media items
#[derive(Clone)]
pub struct UserMetadataRepository {
    db: Database,
}

impl UserMetadataRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, metadata), fields(db.table = "user_metadata", db.operation = "insert", user_id = %metadata.user_id))]
    pub async fn create(&self, metadata: &mut UserMetadata) -> Result<i64, AppError> {
        let tags = json::encode(&metadata.tags)?;
        let now = Utc::now();

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO user_metadata (media_item_id, user_id, user_rating, watched_status, watched_date, \
             personal_notes, tags, favorite, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(metadata.media_item_id)
            .push_bind(metadata.user_id)
            .push_bind(metadata.user_rating)
            .push_bind(metadata.watched_status.as_deref())
            .push_bind(metadata.watched_date)
            .push_bind(metadata.personal_notes.as_deref())
            .push_bind(tags)
            .push_bind(metadata.favorite)
            .push_bind(now)
            .push_bind(now);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        metadata.id = id;
        metadata.created_at = now;
        metadata.updated_at = now;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_metadata", db.operation = "select"))]
    pub async fn get_by_item_and_user(
        &self,
        media_item_id: i64,
        user_id: i64,
    ) -> Result<Option<UserMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_metadata WHERE media_item_id = $1 AND user_id = $2",
            USER_METADATA_COLUMNS
        );
        let row = sqlx::query_as::<Db, UserMetadataRow>(&sql)
            .bind(media_item_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(UserMetadata::from))
    }

    #[tracing::instrument(skip(self, metadata), fields(db.table = "user_metadata", db.operation = "update", db.record_id = %metadata.id))]
    pub async fn update(&self, metadata: &mut UserMetadata) -> Result<(), AppError> {
        let tags = json::encode(&metadata.tags)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE user_metadata SET
                user_rating = $1, watched_status = $2, watched_date = $3,
                personal_notes = $4, tags = $5, favorite = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(metadata.user_rating)
        .bind(metadata.watched_status.as_deref())
        .bind(metadata.watched_date)
        .bind(metadata.personal_notes.as_deref())
        .bind(tags)
        .bind(metadata.favorite)
        .bind(now)
        .bind(metadata.id)
        .execute(self.db.pool())
        .await?;

        metadata.updated_at = now;
        Ok(())
    }

    /// Update the user's row for the item, or create it
    #[tracing::instrument(skip(self, metadata), fields(db.table = "user_metadata", db.operation = "upsert", user_id = %metadata.user_id))]
    pub async fn upsert(&self, metadata: &mut UserMetadata) -> Result<(), AppError> {
        match self
            .get_by_item_and_user(metadata.media_item_id, metadata.user_id)
            .await?
        {
            Some(existing) => {
                metadata.id = existing.id;
                self.update(metadata).await
            }
            None => self.create(metadata).await.map(|_| ()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_metadata", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_favorites(&self, user_id: i64) -> Result<Vec<UserMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_metadata WHERE user_id = $1 AND favorite = TRUE ORDER BY updated_at DESC",
            USER_METADATA_COLUMNS
        );
        let rows = sqlx::query_as::<Db, UserMetadataRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(UserMetadata::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_metadata", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_by_watched_status(
        &self,
        user_id: i64,
        status: &str,
    ) -> Result<Vec<UserMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_metadata WHERE user_id = $1 AND watched_status = $2 ORDER BY watched_date DESC",
            USER_METADATA_COLUMNS
        );
        let rows = sqlx::query_as::<Db, UserMetadataRow>(&sql)
            .bind(user_id)
            .bind(status)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(UserMetadata::from).collect())
    }
}
