use catalog_core::{models::Asset, AppError};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::database::{Database, Db};
use crate::db::json;

const ASSET_COLUMNS: &str = "id, type AS asset_type, status, content_type, size, source_hint, \
                             entity_type, entity_id, metadata, created_at, updated_at, resolved_at, expires_at";

#[derive(Debug, FromRow)]
struct AssetRow {
    id: String,
    asset_type: String,
    status: String,
    content_type: Option<String>,
    size: i64,
    source_hint: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: row.id,
            asset_type: row.asset_type,
            status: row.status,
            content_type: row.content_type.unwrap_or_default(),
            size: row.size,
            source_hint: row.source_hint.unwrap_or_default(),
            entity_type: row.entity_type.unwrap_or_default(),
            entity_id: row.entity_id.unwrap_or_default(),
            metadata: json::decode_or_default(row.metadata.as_deref(), "assets.metadata"),
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
            expires_at: row.expires_at,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

#[derive(Clone)]
pub struct AssetRepository {
    db: Database,
}

impl AssetRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "insert", db.record_id = %asset.id))]
    pub async fn create_asset(&self, asset: &Asset) -> Result<(), AppError> {
        let metadata = json::encode(&asset.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO assets (id, type, status, content_type, size, source_hint,
                entity_type, entity_id, metadata, created_at, updated_at, resolved_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.asset_type)
        .bind(&asset.status)
        .bind(non_empty(&asset.content_type))
        .bind(asset.size)
        .bind(non_empty(&asset.source_hint))
        .bind(non_empty(&asset.entity_type))
        .bind(non_empty(&asset.entity_id))
        .bind(metadata)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .bind(asset.resolved_at)
        .bind(asset.expires_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select", db.record_id = %id))]
    pub async fn get_asset(&self, id: &str) -> Result<Option<Asset>, AppError> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        let row = sqlx::query_as::<Db, AssetRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "update", db.record_id = %asset.id))]
    pub async fn update_asset(&self, asset: &Asset) -> Result<(), AppError> {
        let metadata = json::encode(&asset.metadata)?;

        sqlx::query(
            r#"
            UPDATE assets SET type = $1, status = $2, content_type = $3, size = $4,
                source_hint = $5, entity_type = $6, entity_id = $7, metadata = $8,
                updated_at = $9, resolved_at = $10, expires_at = $11
            WHERE id = $12
            "#,
        )
        .bind(&asset.asset_type)
        .bind(&asset.status)
        .bind(non_empty(&asset.content_type))
        .bind(asset.size)
        .bind(non_empty(&asset.source_hint))
        .bind(non_empty(&asset.entity_type))
        .bind(non_empty(&asset.entity_id))
        .bind(metadata)
        .bind(asset.updated_at)
        .bind(asset.resolved_at)
        .bind(asset.expires_at)
        .bind(&asset.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select_list"))]
    pub async fn find_by_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Asset>, AppError> {
        let sql = format!(
            "SELECT {} FROM assets WHERE entity_type = $1 AND entity_id = $2 ORDER BY created_at DESC, id",
            ASSET_COLUMNS
        );
        let rows = sqlx::query_as::<Db, AssetRow>(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    /// Oldest pending assets first
    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select_list"))]
    pub async fn find_pending(&self, limit: i64) -> Result<Vec<Asset>, AppError> {
        let sql = format!(
            "SELECT {} FROM assets WHERE status = 'pending' ORDER BY created_at ASC, id LIMIT $1",
            ASSET_COLUMNS
        );
        let rows = sqlx::query_as::<Db, AssetRow>(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }
}
