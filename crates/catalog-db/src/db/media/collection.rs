use catalog_core::{models::MediaCollection, AppError};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::json;

const COLLECTION_COLUMNS: &str = r#"
    id, name, collection_type, description, total_items,
    external_ids, cover_url, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: i64,
    name: String,
    collection_type: String,
    description: Option<String>,
    total_items: i32,
    external_ids: Option<String>,
    cover_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CollectionRow> for MediaCollection {
    type Error = AppError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(MediaCollection {
            id: row.id,
            name: row.name,
            collection_type: row.collection_type,
            description: row.description,
            total_items: row.total_items,
            external_ids: json::decode(row.external_ids.as_deref())?.unwrap_or_default(),
            cover_url: row.cover_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Franchise, series and album collections
#[derive(Clone)]
pub struct MediaCollectionRepository {
    db: Database,
}

impl MediaCollectionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, collection), fields(db.table = "media_collections", db.operation = "insert"))]
    pub async fn create(&self, collection: &mut MediaCollection) -> Result<i64, AppError> {
        let external_ids = json::encode(&collection.external_ids)?;
        let now = Utc::now();
        collection.created_at = json::or_now(collection.created_at, now);
        collection.updated_at = json::or_now(collection.updated_at, now);

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO media_collections (name, collection_type, description, total_items, \
             external_ids, cover_url, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&collection.name)
            .push_bind(&collection.collection_type)
            .push_bind(collection.description.as_deref())
            .push_bind(collection.total_items)
            .push_bind(external_ids)
            .push_bind(collection.cover_url.as_deref())
            .push_bind(collection.created_at)
            .push_bind(collection.updated_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        collection.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_collections", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: i64) -> Result<MediaCollection, AppError> {
        let sql = format!("SELECT {} FROM media_collections WHERE id = $1", COLLECTION_COLUMNS);
        let row = sqlx::query_as::<Db, CollectionRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("media collection not found".to_string()))?;
        row.try_into()
    }

    /// A page of collections by id plus the total. Rows with unreadable JSON are skipped.
    #[tracing::instrument(skip(self), fields(db.table = "media_collections", db.operation = "select_list"))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<MediaCollection>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_collections")
            .fetch_one(self.db.pool())
            .await?;

        let sql = format!(
            "SELECT {} FROM media_collections ORDER BY id LIMIT $1 OFFSET $2",
            COLLECTION_COLUMNS
        );
        let rows = sqlx::query_as::<Db, CollectionRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        let mut collections = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match MediaCollection::try_from(row) {
                Ok(collection) => collections.push(collection),
                Err(error) => {
                    tracing::warn!(collection_id = id, error = %error, "Skipping unreadable media collection")
                }
            }
        }

        Ok((collections, total))
    }

    #[tracing::instrument(skip(self, collection), fields(db.table = "media_collections", db.operation = "update", db.record_id = %collection.id))]
    pub async fn update(&self, collection: &mut MediaCollection) -> Result<(), AppError> {
        let external_ids = json::encode(&collection.external_ids)?;
        collection.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE media_collections SET
                name = $1, collection_type = $2, description = $3, total_items = $4,
                external_ids = $5, cover_url = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(&collection.name)
        .bind(&collection.collection_type)
        .bind(collection.description.as_deref())
        .bind(collection.total_items)
        .bind(external_ids)
        .bind(collection.cover_url.as_deref())
        .bind(collection.updated_at)
        .bind(collection.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("media collection not found".to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_collections", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM media_collections WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("media collection not found".to_string()));
        }
        Ok(())
    }
}
