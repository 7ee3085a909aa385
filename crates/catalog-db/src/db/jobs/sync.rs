use catalog_core::{
    models::{SyncEndpoint, SyncSchedule, SyncSession, SyncStatistics},
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const ENDPOINT_COLUMNS: &str = r#"
    id, user_id, name, type AS endpoint_type, url, username, password, sync_direction,
    local_path, remote_path, sync_settings, status, created_at, updated_at, last_sync_at
"#;

const SESSION_COLUMNS: &str = r#"
    id, endpoint_id, user_id, status, sync_type, started_at, completed_at,
    duration, total_files, synced_files, failed_files, skipped_files, error_message
"#;

#[derive(Debug, FromRow)]
struct EndpointRow {
    id: i64,
    user_id: i64,
    name: String,
    endpoint_type: String,
    url: String,
    username: Option<String>,
    password: Option<String>,
    sync_direction: String,
    local_path: String,
    remote_path: Option<String>,
    sync_settings: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl From<EndpointRow> for SyncEndpoint {
    fn from(row: EndpointRow) -> Self {
        SyncEndpoint {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            endpoint_type: row.endpoint_type,
            url: row.url,
            username: row.username,
            password: row.password,
            sync_direction: row.sync_direction,
            local_path: row.local_path,
            remote_path: row.remote_path,
            sync_settings: row.sync_settings,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_sync_at: row.last_sync_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    endpoint_id: i64,
    user_id: i64,
    status: String,
    sync_type: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration: Option<i64>,
    total_files: i32,
    synced_files: i32,
    failed_files: i32,
    skipped_files: i32,
    error_message: Option<String>,
}

impl From<SessionRow> for SyncSession {
    fn from(row: SessionRow) -> Self {
        SyncSession {
            id: row.id,
            endpoint_id: row.endpoint_id,
            user_id: row.user_id,
            status: row.status,
            sync_type: row.sync_type,
            started_at: row.started_at,
            completed_at: row.completed_at,
            duration: stats::duration_from_secs(row.duration),
            total_files: row.total_files,
            synced_files: row.synced_files,
            failed_files: row.failed_files,
            skipped_files: row.skipped_files,
            error_message: row.error_message,
        }
    }
}

/// `<select> WHERE started_at BETWEEN start AND end [AND user_id = ?] <suffix>`
fn windowed<'a>(
    select: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    user_id: Option<i64>,
    suffix: &str,
) -> QueryBuilder<'a, Db> {
    let mut qb = QueryBuilder::<Db>::new(select);
    qb.push(" WHERE started_at BETWEEN ")
        .push_bind(start)
        .push(" AND ")
        .push_bind(end);
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    qb.push(suffix);
    qb
}

/// Sync endpoints, their sessions and schedules
#[derive(Clone)]
pub struct SyncRepository {
    db: Database,
}

impl SyncRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, endpoint), fields(db.table = "sync_endpoints", db.operation = "insert", user_id = %endpoint.user_id))]
    pub async fn create_endpoint(&self, endpoint: &mut SyncEndpoint) -> Result<i64, AppError> {
        let now = Utc::now();
        endpoint.created_at = json::or_now(endpoint.created_at, now);
        endpoint.updated_at = json::or_now(endpoint.updated_at, now);

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO sync_endpoints (user_id, name, type, url, username, password, sync_direction, \
             local_path, remote_path, sync_settings, status, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(endpoint.user_id)
            .push_bind(&endpoint.name)
            .push_bind(&endpoint.endpoint_type)
            .push_bind(&endpoint.url)
            .push_bind(endpoint.username.as_deref())
            .push_bind(endpoint.password.as_deref())
            .push_bind(&endpoint.sync_direction)
            .push_bind(&endpoint.local_path)
            .push_bind(endpoint.remote_path.as_deref())
            .push_bind(endpoint.sync_settings.as_deref())
            .push_bind(&endpoint.status)
            .push_bind(endpoint.created_at)
            .push_bind(endpoint.updated_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        endpoint.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_endpoints", db.operation = "select", db.record_id = %id))]
    pub async fn get_endpoint(&self, id: i64) -> Result<SyncEndpoint, AppError> {
        let sql = format!("SELECT {} FROM sync_endpoints WHERE id = $1", ENDPOINT_COLUMNS);
        let row = sqlx::query_as::<Db, EndpointRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("endpoint not found".to_string()))?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self, endpoint), fields(db.table = "sync_endpoints", db.operation = "update", db.record_id = %endpoint.id))]
    pub async fn update_endpoint(&self, endpoint: &SyncEndpoint) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sync_endpoints
            SET name = $1, type = $2, url = $3, username = $4, password = $5, sync_direction = $6,
                local_path = $7, remote_path = $8, sync_settings = $9, status = $10,
                updated_at = $11, last_sync_at = $12
            WHERE id = $13
            "#,
        )
        .bind(&endpoint.name)
        .bind(&endpoint.endpoint_type)
        .bind(&endpoint.url)
        .bind(endpoint.username.as_deref())
        .bind(endpoint.password.as_deref())
        .bind(&endpoint.sync_direction)
        .bind(&endpoint.local_path)
        .bind(endpoint.remote_path.as_deref())
        .bind(endpoint.sync_settings.as_deref())
        .bind(&endpoint.status)
        .bind(Utc::now())
        .bind(endpoint.last_sync_at)
        .bind(endpoint.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_endpoints", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_endpoint(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sync_endpoints WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_endpoints", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_endpoints(&self, user_id: i64) -> Result<Vec<SyncEndpoint>, AppError> {
        let sql = format!(
            "SELECT {} FROM sync_endpoints WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            ENDPOINT_COLUMNS
        );
        let rows = sqlx::query_as::<Db, EndpointRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(SyncEndpoint::from).collect())
    }

    /// Active endpoints of one type
    #[tracing::instrument(skip(self), fields(db.table = "sync_endpoints", db.operation = "select_list"))]
    pub async fn get_endpoints_by_type(&self, endpoint_type: &str) -> Result<Vec<SyncEndpoint>, AppError> {
        let sql = format!(
            "SELECT {} FROM sync_endpoints WHERE type = $1 AND status = 'active' \
             ORDER BY created_at DESC, id DESC",
            ENDPOINT_COLUMNS
        );
        let rows = sqlx::query_as::<Db, EndpointRow>(&sql)
            .bind(endpoint_type)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(SyncEndpoint::from).collect())
    }

    #[tracing::instrument(skip(self, session), fields(db.table = "sync_sessions", db.operation = "insert", endpoint_id = %session.endpoint_id))]
    pub async fn create_session(&self, session: &mut SyncSession) -> Result<i64, AppError> {
        let now = Utc::now();
        session.started_at = json::or_now(session.started_at, now);

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO sync_sessions (endpoint_id, user_id, status, sync_type, started_at, \
             total_files, synced_files, failed_files, skipped_files, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(session.endpoint_id)
            .push_bind(session.user_id)
            .push_bind(&session.status)
            .push_bind(&session.sync_type)
            .push_bind(session.started_at)
            .push_bind(session.total_files)
            .push_bind(session.synced_files)
            .push_bind(session.failed_files)
            .push_bind(session.skipped_files)
            .push_bind(now);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        session.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_sessions", db.operation = "select", db.record_id = %id))]
    pub async fn get_session(&self, id: i64) -> Result<SyncSession, AppError> {
        let sql = format!("SELECT {} FROM sync_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query_as::<Db, SessionRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;
        Ok(row.into())
    }

    /// Persist progress counters, completion and error
    #[tracing::instrument(skip(self, session), fields(db.table = "sync_sessions", db.operation = "update", db.record_id = %session.id))]
    pub async fn update_session(&self, session: &SyncSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sync_sessions
            SET status = $1, completed_at = $2, duration = $3, total_files = $4, synced_files = $5,
                failed_files = $6, skipped_files = $7, error_message = $8, updated_at = $9
            WHERE id = $10
            "#,
        )
        .bind(&session.status)
        .bind(session.completed_at)
        .bind(stats::duration_to_secs(session.duration))
        .bind(session.total_files)
        .bind(session.synced_files)
        .bind(session.failed_files)
        .bind(session.skipped_files)
        .bind(session.error_message.as_deref())
        .bind(Utc::now())
        .bind(session.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_sessions", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_sessions(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<SyncSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM sync_sessions WHERE user_id = $1 \
             ORDER BY started_at DESC, id DESC LIMIT $2 OFFSET $3",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<Db, SessionRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(SyncSession::from).collect())
    }

    /// Delete finished sessions completed before `older_than`
    #[tracing::instrument(skip(self), fields(db.table = "sync_sessions", db.operation = "delete"))]
    pub async fn cleanup_sessions(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM sync_sessions \
             WHERE completed_at < $1 AND status IN ('completed', 'failed', 'cancelled')",
        )
        .bind(older_than)
        .execute(self.db.pool())
        .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleaned up sync sessions");
        Ok(removed)
    }

    #[tracing::instrument(skip(self, schedule), fields(db.table = "sync_schedules", db.operation = "insert", endpoint_id = %schedule.endpoint_id))]
    pub async fn create_schedule(&self, schedule: &mut SyncSchedule) -> Result<i64, AppError> {
        schedule.created_at = json::or_now(schedule.created_at, Utc::now());

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO sync_schedules (endpoint_id, user_id, frequency, last_run, next_run, is_active, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(schedule.endpoint_id)
            .push_bind(schedule.user_id)
            .push_bind(&schedule.frequency)
            .push_bind(schedule.last_run)
            .push_bind(schedule.next_run)
            .push_bind(schedule.is_active)
            .push_bind(schedule.created_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        schedule.id = id;
        Ok(id)
    }

    /// Active schedules, soonest run first
    #[tracing::instrument(skip(self), fields(db.table = "sync_schedules", db.operation = "select_list"))]
    pub async fn get_active_schedules(&self) -> Result<Vec<SyncSchedule>, AppError> {
        let schedules = sqlx::query_as::<Db, SyncSchedule>(
            r#"
            SELECT id, endpoint_id, user_id, frequency, last_run, next_run, is_active, created_at
            FROM sync_schedules
            WHERE is_active = TRUE
            ORDER BY next_run ASC, id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(schedules)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sync_sessions", db.operation = "aggregate"))]
    pub async fn get_statistics(
        &self,
        user_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SyncStatistics, AppError> {
        let by_status: Vec<(String, i64)> = windowed(
            "SELECT status, COUNT(*) FROM sync_sessions",
            start,
            end,
            user_id,
            " GROUP BY status",
        )
        .build_query_as()
        .fetch_all(self.db.pool())
        .await?;

        let by_type: Vec<(String, i64)> = windowed(
            "SELECT sync_type, COUNT(*) FROM sync_sessions",
            start,
            end,
            user_id,
            " GROUP BY sync_type",
        )
        .build_query_as()
        .fetch_all(self.db.pool())
        .await?;

        let (total_files_synced, total_files_failed): (i64, i64) = windowed(
            "SELECT CAST(COALESCE(SUM(synced_files), 0) AS BIGINT), \
             CAST(COALESCE(SUM(failed_files), 0) AS BIGINT) FROM sync_sessions",
            start,
            end,
            user_id,
            " AND status = 'completed'",
        )
        .build_query_as()
        .fetch_one(self.db.pool())
        .await?;

        let avg_seconds: Option<f64> = windowed(
            "SELECT CAST(AVG(duration) AS DOUBLE PRECISION) FROM sync_sessions",
            start,
            end,
            user_id,
            " AND status = 'completed' AND duration IS NOT NULL",
        )
        .build_query_scalar()
        .fetch_one(self.db.pool())
        .await?;

        let by_status = stats::to_count_map(by_status);
        let total_sessions = by_status.values().sum();
        let success_rate = stats::success_rate_by_status(&by_status);

        Ok(SyncStatistics {
            start_date: start,
            end_date: end,
            total_sessions,
            total_files_synced,
            total_files_failed,
            by_status,
            by_type: stats::to_count_map(by_type),
            average_duration: stats::average_duration(avg_seconds),
            success_rate,
        })
    }
}
