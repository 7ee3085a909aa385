use catalog_core::{models::ExternalMetadata, AppError};
use chrono::Utc;
use sqlx::QueryBuilder;

use crate::db::database::{Database, Db};

const METADATA_COLUMNS: &str = r#"
    id, media_item_id, provider, external_id, data, rating,
    review_url, cover_url, trailer_url, last_fetched
"#;

/// Provider metadata attached to media items
#[derive(Clone)]
pub struct ExternalMetadataRepository {
    db: Database,
}

impl ExternalMetadataRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, metadata), fields(db.table = "external_metadata", db.operation = "insert", provider = %metadata.provider))]
    pub async fn create(&self, metadata: &mut ExternalMetadata) -> Result<i64, AppError> {
        let now = Utc::now();
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO external_metadata (media_item_id, provider, external_id, data, rating, \
             review_url, cover_url, trailer_url, last_fetched) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(metadata.media_item_id)
            .push_bind(&metadata.provider)
            .push_bind(&metadata.external_id)
            .push_bind(&metadata.data)
            .push_bind(metadata.rating)
            .push_bind(metadata.review_url.as_deref())
            .push_bind(metadata.cover_url.as_deref())
            .push_bind(metadata.trailer_url.as_deref())
            .push_bind(now);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        metadata.id = id;
        metadata.last_fetched = now;
        Ok(id)
    }

    /// All provider records of an item, by provider name
    #[tracing::instrument(skip(self), fields(db.table = "external_metadata", db.operation = "select_list"))]
    pub async fn get_by_item(&self, media_item_id: i64) -> Result<Vec<ExternalMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM external_metadata WHERE media_item_id = $1 ORDER BY provider",
            METADATA_COLUMNS
        );
        let records = sqlx::query_as::<Db, ExternalMetadata>(&sql)
            .bind(media_item_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "external_metadata", db.operation = "select"))]
    pub async fn get_by_provider(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<ExternalMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM external_metadata WHERE provider = $1 AND external_id = $2 LIMIT 1",
            METADATA_COLUMNS
        );
        let record = sqlx::query_as::<Db, ExternalMetadata>(&sql)
            .bind(provider)
            .bind(external_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record)
    }

    async fn find_by_item_and_provider(
        &self,
        media_item_id: i64,
        provider: &str,
    ) -> Result<Option<ExternalMetadata>, AppError> {
        let sql = format!(
            "SELECT {} FROM external_metadata WHERE media_item_id = $1 AND provider = $2 LIMIT 1",
            METADATA_COLUMNS
        );
        let record = sqlx::query_as::<Db, ExternalMetadata>(&sql)
            .bind(media_item_id)
            .bind(provider)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record)
    }

    /// Refresh the item's record for this provider, creating it when missing
    #[tracing::instrument(skip(self, metadata), fields(db.table = "external_metadata", db.operation = "upsert", provider = %metadata.provider))]
    pub async fn upsert(&self, metadata: &mut ExternalMetadata) -> Result<(), AppError> {
        let existing = self
            .find_by_item_and_provider(metadata.media_item_id, &metadata.provider)
            .await?;

        let Some(existing) = existing else {
            self.create(metadata).await?;
            return Ok(());
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE external_metadata SET
                external_id = $1, data = $2, rating = $3, review_url = $4,
                cover_url = $5, trailer_url = $6, last_fetched = $7
            WHERE id = $8
            "#,
        )
        .bind(&metadata.external_id)
        .bind(&metadata.data)
        .bind(metadata.rating)
        .bind(metadata.review_url.as_deref())
        .bind(metadata.cover_url.as_deref())
        .bind(metadata.trailer_url.as_deref())
        .bind(now)
        .bind(existing.id)
        .execute(self.db.pool())
        .await?;

        metadata.id = existing.id;
        metadata.last_fetched = now;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "external_metadata", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM external_metadata WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
