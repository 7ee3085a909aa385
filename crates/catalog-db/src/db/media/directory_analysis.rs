use catalog_core::{
    models::{AnalysisData, DirectoryAnalysis},
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::json;

const ANALYSIS_COLUMNS: &str = "id, directory_path, storage_root, media_item_id, confidence_score, \
                                detection_method, analysis_data, last_analyzed, files_count, total_size";

#[derive(Debug, FromRow)]
struct DirectoryAnalysisRow {
    id: i64,
    directory_path: String,
    storage_root: String,
    media_item_id: Option<i64>,
    confidence_score: f64,
    detection_method: String,
    analysis_data: Option<String>,
    last_analyzed: DateTime<Utc>,
    files_count: i64,
    total_size: i64,
}

impl From<DirectoryAnalysisRow> for DirectoryAnalysis {
    fn from(row: DirectoryAnalysisRow) -> Self {
        let analysis_data: Option<AnalysisData> =
            json::decode_or_default(row.analysis_data.as_deref(), "directory_analyses.analysis_data");
        DirectoryAnalysis {
            id: row.id,
            directory_path: row.directory_path,
            storage_root: row.storage_root,
            media_item_id: row.media_item_id,
            confidence_score: row.confidence_score,
            detection_method: row.detection_method,
            analysis_data,
            last_analyzed: row.last_analyzed,
            files_count: row.files_count,
            total_size: row.total_size,
        }
    }
}

/// Per-directory media detection results awaiting or linked to a catalog item
#[derive(Clone)]
pub struct DirectoryAnalysisRepository {
    db: Database,
}

impl DirectoryAnalysisRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, analysis), fields(db.table = "directory_analyses", db.operation = "insert", path = %analysis.directory_path))]
    pub async fn create(&self, analysis: &mut DirectoryAnalysis) -> Result<i64, AppError> {
        let analysis_data = json::encode_opt(analysis.analysis_data.as_ref())?;
        let now = Utc::now();

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO directory_analyses (directory_path, storage_root, media_item_id, confidence_score, \
             detection_method, analysis_data, last_analyzed, files_count, total_size) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&analysis.directory_path)
            .push_bind(&analysis.storage_root)
            .push_bind(analysis.media_item_id)
            .push_bind(analysis.confidence_score)
            .push_bind(&analysis.detection_method)
            .push_bind(analysis_data)
            .push_bind(now)
            .push_bind(analysis.files_count)
            .push_bind(analysis.total_size);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        analysis.id = id;
        analysis.last_analyzed = now;
        Ok(id)
    }

    /// Most recent analysis of a directory path
    #[tracing::instrument(skip(self), fields(db.table = "directory_analyses", db.operation = "select"))]
    pub async fn get_by_path(&self, path: &str) -> Result<Option<DirectoryAnalysis>, AppError> {
        let sql = format!(
            "SELECT {} FROM directory_analyses WHERE directory_path = $1 ORDER BY last_analyzed DESC, id DESC LIMIT 1",
            ANALYSIS_COLUMNS
        );
        let row = sqlx::query_as::<Db, DirectoryAnalysisRow>(&sql)
            .bind(path)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(DirectoryAnalysis::from))
    }

    #[tracing::instrument(skip(self, analysis), fields(db.table = "directory_analyses", db.operation = "update", db.record_id = %analysis.id))]
    pub async fn update(&self, analysis: &mut DirectoryAnalysis) -> Result<(), AppError> {
        let analysis_data = json::encode_opt(analysis.analysis_data.as_ref())?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE directory_analyses SET storage_root = $1, media_item_id = $2, confidence_score = $3,
                detection_method = $4, analysis_data = $5, last_analyzed = $6,
                files_count = $7, total_size = $8
            WHERE id = $9
            "#,
        )
        .bind(&analysis.storage_root)
        .bind(analysis.media_item_id)
        .bind(analysis.confidence_score)
        .bind(&analysis.detection_method)
        .bind(analysis_data)
        .bind(now)
        .bind(analysis.files_count)
        .bind(analysis.total_size)
        .bind(analysis.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("directory analysis not found".to_string()));
        }
        analysis.last_analyzed = now;
        Ok(())
    }

    /// Analyses not yet linked to a media item, most confident first
    #[tracing::instrument(skip(self), fields(db.table = "directory_analyses", db.operation = "select_list"))]
    pub async fn get_unprocessed(&self, limit: i64) -> Result<Vec<DirectoryAnalysis>, AppError> {
        let sql = format!(
            "SELECT {} FROM directory_analyses WHERE media_item_id IS NULL \
             ORDER BY confidence_score DESC, id LIMIT $1",
            ANALYSIS_COLUMNS
        );
        let rows = sqlx::query_as::<Db, DirectoryAnalysisRow>(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(DirectoryAnalysis::from).collect())
    }
}
