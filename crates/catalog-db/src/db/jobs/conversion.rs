use catalog_core::{
    models::{ConversionJob, ConversionStatistics, FormatPopularity},
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const JOB_COLUMNS: &str = r#"
    id, user_id, source_path, target_path, source_format, target_format,
    conversion_type, quality, settings, priority, status, created_at,
    started_at, completed_at, scheduled_for, duration, error_message
"#;

#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    user_id: i64,
    source_path: String,
    target_path: String,
    source_format: String,
    target_format: String,
    conversion_type: String,
    quality: String,
    settings: Option<String>,
    priority: i32,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    scheduled_for: Option<DateTime<Utc>>,
    duration: Option<i64>,
    error_message: Option<String>,
}

impl From<JobRow> for ConversionJob {
    fn from(row: JobRow) -> Self {
        ConversionJob {
            id: row.id,
            user_id: row.user_id,
            source_path: row.source_path,
            target_path: row.target_path,
            source_format: row.source_format,
            target_format: row.target_format,
            conversion_type: row.conversion_type,
            quality: row.quality,
            settings: row.settings,
            priority: row.priority,
            status: row.status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            scheduled_for: row.scheduled_for,
            duration: stats::duration_from_secs(row.duration),
            error_message: row.error_message,
        }
    }
}

/// `<select> WHERE created_at BETWEEN start AND end [AND user_id = ?] <suffix>`
fn windowed<'a>(
    select: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    user_id: Option<i64>,
    suffix: &str,
) -> QueryBuilder<'a, Db> {
    let mut qb = QueryBuilder::<Db>::new(select);
    qb.push(" WHERE created_at BETWEEN ")
        .push_bind(start)
        .push(" AND ")
        .push_bind(end);
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    qb.push(suffix);
    qb
}

/// Conversion job queue and its statistics
#[derive(Clone)]
pub struct ConversionRepository {
    db: Database,
}

impl ConversionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, job), fields(db.table = "conversion_jobs", db.operation = "insert", user_id = %job.user_id))]
    pub async fn create_job(&self, job: &mut ConversionJob) -> Result<i64, AppError> {
        let now = Utc::now();
        job.created_at = json::or_now(job.created_at, now);

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO conversion_jobs (user_id, source_path, target_path, source_format, target_format, \
             conversion_type, quality, settings, priority, status, created_at, updated_at, scheduled_for) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(job.user_id)
            .push_bind(&job.source_path)
            .push_bind(&job.target_path)
            .push_bind(&job.source_format)
            .push_bind(&job.target_format)
            .push_bind(&job.conversion_type)
            .push_bind(&job.quality)
            .push_bind(job.settings.as_deref())
            .push_bind(job.priority)
            .push_bind(&job.status)
            .push_bind(job.created_at)
            .push_bind(now)
            .push_bind(job.scheduled_for);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        job.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "select", db.record_id = %id))]
    pub async fn get_job(&self, id: i64) -> Result<ConversionJob, AppError> {
        let sql = format!("SELECT {} FROM conversion_jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query_as::<Db, JobRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("job not found".to_string()))?;
        Ok(row.into())
    }

    /// Persist progress: status, timing and error
    #[tracing::instrument(skip(self, job), fields(db.table = "conversion_jobs", db.operation = "update", db.record_id = %job.id))]
    pub async fn update_job(&self, job: &ConversionJob) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE conversion_jobs
            SET status = $1, started_at = $2, completed_at = $3, duration = $4,
                error_message = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&job.status)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(stats::duration_to_secs(job.duration))
        .bind(job.error_message.as_deref())
        .bind(Utc::now())
        .bind(job.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// A user's jobs, newest first, optionally narrowed to one status
    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_jobs(
        &self,
        user_id: i64,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversionJob>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM conversion_jobs WHERE user_id = ", JOB_COLUMNS));
        qb.push_bind(user_id);
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build_query_as::<JobRow>().fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(ConversionJob::from).collect())
    }

    /// Queue order: highest priority first, then oldest
    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "select_list"))]
    pub async fn get_jobs_by_status(&self, status: &str, limit: i64) -> Result<Vec<ConversionJob>, AppError> {
        let sql = format!(
            "SELECT {} FROM conversion_jobs WHERE status = $1 \
             ORDER BY priority DESC, created_at ASC, id ASC LIMIT $2",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<Db, JobRow>(&sql)
            .bind(status)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(ConversionJob::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "aggregate"))]
    pub async fn get_statistics(
        &self,
        user_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ConversionStatistics, AppError> {
        let by_status: Vec<(String, i64)> = windowed(
            "SELECT status, COUNT(*) FROM conversion_jobs",
            start,
            end,
            user_id,
            " GROUP BY status",
        )
        .build_query_as()
        .fetch_all(self.db.pool())
        .await?;

        let by_type: Vec<(String, i64)> = windowed(
            "SELECT conversion_type, COUNT(*) FROM conversion_jobs",
            start,
            end,
            user_id,
            " GROUP BY conversion_type",
        )
        .build_query_as()
        .fetch_all(self.db.pool())
        .await?;

        let by_format: Vec<(String, i64)> = windowed(
            "SELECT target_format, COUNT(*) FROM conversion_jobs",
            start,
            end,
            user_id,
            " GROUP BY target_format ORDER BY COUNT(*) DESC, target_format ASC LIMIT 10",
        )
        .build_query_as()
        .fetch_all(self.db.pool())
        .await?;

        let avg_seconds: Option<f64> = windowed(
            "SELECT CAST(AVG(duration) AS DOUBLE PRECISION) FROM conversion_jobs",
            start,
            end,
            user_id,
            " AND status = 'completed' AND duration IS NOT NULL",
        )
        .build_query_scalar()
        .fetch_one(self.db.pool())
        .await?;

        let by_status = stats::to_count_map(by_status);
        let total_jobs = by_status.values().sum();
        let success_rate = stats::success_rate_by_status(&by_status);

        Ok(ConversionStatistics {
            start_date: start,
            end_date: end,
            total_jobs,
            by_status,
            by_type: stats::to_count_map(by_type),
            by_format: stats::to_count_map(by_format),
            average_duration: stats::average_duration(avg_seconds),
            success_rate,
        })
    }

    /// Delete finished jobs completed before `older_than`
    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "delete"))]
    pub async fn cleanup_jobs(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM conversion_jobs \
             WHERE completed_at < $1 AND status IN ('completed', 'failed', 'cancelled')",
        )
        .bind(older_than)
        .execute(self.db.pool())
        .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleaned up conversion jobs");
        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "count"))]
    pub async fn get_active_jobs_count(&self) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversion_jobs WHERE status IN ('pending', 'running')")
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "count", user_id = %user_id))]
    pub async fn get_jobs_count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversion_jobs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Most requested target formats among completed jobs
    #[tracing::instrument(skip(self), fields(db.table = "conversion_jobs", db.operation = "aggregate"))]
    pub async fn get_popular_formats(&self, limit: i64) -> Result<Vec<FormatPopularity>, AppError> {
        let formats = sqlx::query_as::<Db, FormatPopularity>(
            r#"
            SELECT target_format AS format, COUNT(*) AS count
            FROM conversion_jobs
            WHERE status = 'completed'
            GROUP BY target_format
            ORDER BY COUNT(*) DESC, target_format ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(formats)
    }
}
