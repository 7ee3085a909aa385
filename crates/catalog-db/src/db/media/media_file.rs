use catalog_core::{
    models::{DuplicateFileGroup, MediaFileRecord},
    AppError,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Row};

use crate::db::database::{Database, Db};

/// Links between media items and the files that carry them
#[derive(Clone)]
pub struct MediaFileRepository {
    db: Database,
}

impl MediaFileRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, quality_info, language), fields(db.table = "media_files", db.operation = "insert"))]
    pub async fn link_file_to_item(
        &self,
        media_item_id: i64,
        file_id: i64,
        quality_info: Option<&str>,
        language: Option<&str>,
        is_primary: bool,
    ) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO media_files (media_item_id, file_id, quality_info, language, is_primary, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(media_item_id)
            .push_bind(file_id)
            .push_bind(quality_info)
            .push_bind(language)
            .push_bind(is_primary)
            .push_bind(Utc::now());
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "delete"))]
    pub async fn unlink_file(&self, media_item_id: i64, file_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM media_files WHERE media_item_id = $1 AND file_id = $2")
            .bind(media_item_id)
            .bind(file_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Primary file first, then in link order
    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "select_list"))]
    pub async fn get_files_by_item(&self, media_item_id: i64) -> Result<Vec<MediaFileRecord>, AppError> {
        let records = sqlx::query_as::<Db, MediaFileRecord>(
            r#"
            SELECT id, media_item_id, file_id, quality_info, language, is_primary, created_at
            FROM media_files
            WHERE media_item_id = $1
            ORDER BY is_primary DESC, created_at ASC, id ASC
            "#,
        )
        .bind(media_item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "select_list"))]
    pub async fn get_items_by_file(&self, file_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT media_item_id FROM media_files WHERE file_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(file_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids)
    }

    /// Files linked to more than one media item
    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "group"))]
    pub async fn get_duplicate_files(&self) -> Result<Vec<DuplicateFileGroup>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT file_id, COUNT(*) AS item_count
            FROM media_files
            GROUP BY file_id
            HAVING COUNT(*) > 1
            ORDER BY file_id
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let file_id: i64 = row.try_get("file_id")?;
            let item_count: i64 = row.try_get("item_count")?;
            let item_ids = self.get_items_by_file(file_id).await?;
            groups.push(DuplicateFileGroup {
                file_id,
                item_count,
                item_ids,
            });
        }
        Ok(groups)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "count"))]
    pub async fn count_by_item(&self, media_item_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_files WHERE media_item_id = $1")
            .bind(media_item_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Make `file_id` the only primary file of the item
    #[tracing::instrument(skip(self), fields(db.table = "media_files", db.operation = "update"))]
    pub async fn set_primary(&self, media_item_id: i64, file_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE media_files SET is_primary = FALSE WHERE media_item_id = $1")
            .bind(media_item_id)
            .execute(&mut **tx)
            .await?;

        let result = sqlx::query(
            "UPDATE media_files SET is_primary = TRUE WHERE media_item_id = $1 AND file_id = $2",
        )
        .bind(media_item_id)
        .bind(file_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("media file link not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }
}
